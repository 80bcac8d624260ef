// src/handlers/cma.rs
use crate::cma::{generate_report, CmaError, CmaReport, CmaRequest};
use crate::AppState;
use axum::{extract::Extension, response::Json, routing::post, Router};
use std::sync::Arc;

pub fn cma_routes() -> Router {
    Router::new().route("/api/cma/generate", post(generate_cma))
}

async fn generate_cma(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CmaRequest>,
) -> Result<Json<CmaReport>, CmaError> {
    let report = generate_report(&request, &state.catalog)?;
    tracing::info!(
        "📊 CMA generated for '{}': {} ({} comparables, {:?})",
        report.address,
        report.estimated_value,
        report.comparables_used,
        report.confidence
    );
    Ok(Json(report))
}
