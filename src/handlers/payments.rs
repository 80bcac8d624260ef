// src/handlers/payments.rs
use crate::AppState;
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsConfig {
    pub publishable_key: Option<String>,
}

pub fn payment_routes() -> Router {
    Router::new().route("/api/payments/config", get(payments_config))
}

/// Publishable key for the browser checkout. Charges never pass through this service.
async fn payments_config(Extension(state): Extension<Arc<AppState>>) -> Json<PaymentsConfig> {
    Json(PaymentsConfig {
        publishable_key: state.config.stripe_public_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::test_state;

    #[tokio::test]
    async fn test_key_is_null_when_unset() {
        let Json(config) = payments_config(Extension(test_state())).await;
        assert!(config.publishable_key.is_none());
        assert_eq!(serde_json::to_value(&config).unwrap(), serde_json::json!({ "publishableKey": null }));
    }
}
