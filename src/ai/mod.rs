// src/ai/mod.rs
//! LLM-backed helpers for the marketplace: term explanations and the help chatbot.
//!
//! Every entry point returns a usable answer. Upstream errors and timeouts are
//! logged and replaced by deterministic fallbacks.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod chatbot;
pub mod explain;

/// Hard limit for a single upstream completion.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest term, message or history turn accepted from a client.
pub const MAX_INPUT_CHARS: usize = 2000;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI client not configured")]
    NotConfigured,
    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),
    #[error("AI request failed: {0}")]
    Upstream(String),
    #[error("AI returned an empty response")]
    Empty,
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, AiError>;
}

#[derive(Clone)]
pub struct AiAssistant {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl AiAssistant {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            timeout: UPSTREAM_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let generator = self.generator.as_ref().ok_or(AiError::NotConfigured)?;

        let text = tokio::time::timeout(self.timeout, generator.generate_text(prompt))
            .await
            .map_err(|_| AiError::Timeout(self.timeout))??;

        if text.trim().is_empty() {
            return Err(AiError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Generator with a canned behaviour.
    pub enum StubGenerator {
        Reply(String),
        Fail,
        Hang,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate_text(&self, _prompt: &str) -> Result<String, AiError> {
            match self {
                StubGenerator::Reply(text) => Ok(text.clone()),
                StubGenerator::Fail => Err(AiError::Upstream("503 Service Unavailable".to_string())),
                StubGenerator::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    pub fn assistant(stub: StubGenerator) -> AiAssistant {
        AiAssistant::new(Some(Arc::new(stub))).with_timeout(Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_complete_times_out() {
        let ai = assistant(StubGenerator::Hang);
        assert!(matches!(ai.complete("hi").await, Err(AiError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_complete_rejects_blank_reply() {
        let ai = assistant(StubGenerator::Reply("  \n".to_string()));
        assert!(matches!(ai.complete("hi").await, Err(AiError::Empty)));
    }

    #[tokio::test]
    async fn test_unconfigured_assistant() {
        let ai = AiAssistant::new(None);
        assert!(!ai.is_configured());
        assert!(matches!(ai.complete("hi").await, Err(AiError::NotConfigured)));
    }
}
