use serde::{Deserialize, Serialize};

/// Where an AI answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Structured reply straight from the model
    Ai,
    /// Free-text model reply recovered by the regex parser
    Heuristic,
    /// Canned answer, upstream failed or timed out
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub term: String,
    pub definition: String,
    pub implications: String,
    pub related_terms: Vec<String>,
    pub source: ResponseSource,
}

#[derive(Debug, Deserialize)]
pub struct ExplainTermRequest {
    pub term: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatbotReply {
    pub response: String,
    pub source: ResponseSource,
}
