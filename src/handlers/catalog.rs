// src/handlers/catalog.rs
use crate::models::auth::ErrorResponse;
use crate::models::catalog::{
    FinancingProvider, FinancingQuery, Property, PropertyQuery, ServiceProvider, ServiceProviderQuery,
};
use crate::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn catalog_routes() -> Router {
    Router::new()
        .route("/api/properties", get(list_properties))
        .route("/api/properties/:id", get(get_property))
        .route("/api/service-providers", get(list_service_providers))
        .route("/api/financing-providers", get(list_financing_providers))
}

async fn list_properties(
    Query(query): Query<PropertyQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<Property>> {
    Json(state.catalog.find_properties(&query))
}

async fn get_property(
    Path(id): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Property>, (StatusCode, Json<ErrorResponse>)> {
    state.catalog.property(&id).cloned().map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Property {} not found", id))),
        )
    })
}

async fn list_service_providers(
    Query(query): Query<ServiceProviderQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<ServiceProvider>> {
    Json(state.catalog.find_service_providers(&query))
}

async fn list_financing_providers(
    Query(query): Query<FinancingQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<FinancingProvider>> {
    Json(state.catalog.find_financing_providers(&query))
}
