// src/config.rs
use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEV_JWT_SECRET: &str = "default_secret";

/// Runtime configuration collected from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub idx_broker_api_key: Option<String>,
    pub stripe_public_key: Option<String>,
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = match non_empty_var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set. Using the development secret; do not run like this in production.");
                DEV_JWT_SECRET.to_string()
            }
        };

        Self {
            bind_addr: non_empty_var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections: non_empty_var("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            // The frontend historically used either name for the same key
            gemini_api_key: non_empty_var("GEMINI_API_KEY").or_else(|| non_empty_var("GOOGLE_GEMINI_API_KEY")),
            gemini_model: non_empty_var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            idx_broker_api_key: non_empty_var("IDX_BROKER_API_KEY"),
            stripe_public_key: non_empty_var("VITE_STRIPE_PUBLIC_KEY"),
            jwt_secret,
        }
    }

    /// Configuration with every optional integration disabled.
    #[cfg(test)]
    pub fn local() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            database_max_connections: 5,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            idx_broker_api_key: None,
            stripe_public_key: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
