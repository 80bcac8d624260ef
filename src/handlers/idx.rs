// src/handlers/idx.rs
use crate::idx_client::sample_listings;
use crate::models::listing::{Listing, ListingSearchQuery, ListingSource, ListingsResponse, SearchCriteria};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NO_CRITERIA_MESSAGE: &str =
    "Please enter at least one search criterion (city, zip, price range, beds, baths, property type or keyword)";

pub fn idx_routes() -> Router {
    Router::new()
        .route("/api/idx/listings/featured", get(featured_listings))
        .route("/api/idx/listings/search", get(search_listings))
}

async fn featured_listings(Extension(state): Extension<Arc<AppState>>) -> Json<ListingsResponse> {
    let (listings, source) = load_listings(&state).await;
    Json(ListingsResponse::new(listings, source))
}

async fn search_listings(
    Query(query): Query<ListingSearchQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ListingsResponse>, (StatusCode, Json<Value>)> {
    let criteria = SearchCriteria::from_query(&query);
    if criteria.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": NO_CRITERIA_MESSAGE }))));
    }

    let (listings, source) = load_listings(&state).await;
    let matches: Vec<Listing> = listings.into_iter().filter(|l| criteria.matches(l)).collect();
    tracing::debug!("🔎 Listing search matched {} results ({:?})", matches.len(), source);

    Ok(Json(ListingsResponse::new(matches, source)))
}

/// IDX listings when the vendor answers with data, catalog samples otherwise.
async fn load_listings(state: &AppState) -> (Vec<Listing>, ListingSource) {
    if let Some(client) = &state.idx_client {
        match client.featured_listings().await {
            Ok(listings) if !listings.is_empty() => return (listings, ListingSource::Idx),
            Ok(_) => tracing::warn!("IDX returned no featured listings, serving sample listings"),
            Err(e) => tracing::warn!("IDX request failed: {}. Serving sample listings", e),
        }
    }
    (sample_listings(&state.catalog), ListingSource::Sample)
}
