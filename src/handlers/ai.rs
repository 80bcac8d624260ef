// src/handlers/ai.rs
use crate::ai::MAX_INPUT_CHARS;
use crate::middleware::rate_limit::ai_rate_limit_middleware;
use crate::models::ai::{ChatbotReply, ChatbotRequest, ExplainTermRequest, Explanation};
use crate::models::auth::ErrorResponse;
use crate::AppState;
use axum::{extract::Extension, http::StatusCode, response::Json, routing::post, Router};
use std::sync::Arc;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn ai_routes() -> Router {
    Router::new()
        .route("/api/ai/explain-term", post(explain_term))
        .route("/api/chatbot", post(chatbot))
        .route_layer(axum::middleware::from_fn(ai_rate_limit_middleware))
}

async fn explain_term(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ExplainTermRequest>,
) -> Result<Json<Explanation>, ApiError> {
    let term = required_text(&request.term, "term")?;
    let context = request.context.as_deref().map(str::trim).filter(|c| !c.is_empty());

    tracing::info!("📖 Explaining term: '{}'", term);
    Ok(Json(state.ai.explain_term(term, context).await))
}

async fn chatbot(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ChatbotRequest>,
) -> Result<Json<ChatbotReply>, ApiError> {
    let message = required_text(&request.message, "message")?;

    tracing::debug!("🤖 Chatbot message ({} history turns)", request.history.len());
    Ok(Json(state.ai.chat(message, &request.history).await))
}

fn required_text<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("{} is required", field))),
        ));
    }
    if trimmed.chars().count() > MAX_INPUT_CHARS {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!(
                "{} must be at most {} characters",
                field, MAX_INPUT_CHARS
            ))),
        ));
    }
    Ok(trimmed)
}
