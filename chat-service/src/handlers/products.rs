//! Product catalog handlers.

use crate::models::Product;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::instrument;

/// Hard cap on search result size.
const MAX_SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub search_type: &'static str,
    pub results_count: usize,
    pub results: Vec<Product>,
}

fn validate_query(query: &str) -> Result<String, AppError> {
    let trimmed = query.trim();
    if trimmed.len() < 2 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Query must be at least 2 characters long"
        )));
    }
    Ok(trimmed.to_string())
}

/// Search products by product name.
///
/// GET /api/products/search?q=...&limit=...
#[instrument(skip(state))]
pub async fn search_by_name(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = validate_query(&query.q)?;
    let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);

    let results = state.db.search_products_by_name(&q, Some(limit)).await?;

    Ok(Json(SearchResponse {
        query: q,
        search_type: "product_name",
        results_count: results.len(),
        results,
    }))
}

/// Search products by crop.
///
/// GET /api/products/search-by-crop?q=...&limit=...
#[instrument(skip(state))]
pub async fn search_by_crop(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = validate_query(&query.q)?;
    let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);

    let results = state.db.search_products(&q, Some(limit)).await?;

    Ok(Json(SearchResponse {
        query: q,
        search_type: "crop",
        results_count: results.len(),
        results,
    }))
}

/// Get a specific product by exact name.
///
/// GET /api/products/:product_name
#[instrument(skip(state))]
pub async fn get_by_name(
    State(state): State<AppState>,
    Path(product_name): Path<String>,
) -> Result<Json<Product>, AppError> {
    let name = validate_query(&product_name)?;

    state
        .db
        .get_product_by_name(&name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product '{}' not found", name)))
}

#[derive(Debug, Serialize)]
pub struct CropsResponse {
    pub crops_count: usize,
    pub crops: Vec<String>,
}

/// List all crop types in the catalog.
///
/// GET /api/crops
#[instrument(skip(state))]
pub async fn list_crops(State(state): State<AppState>) -> Result<Json<CropsResponse>, AppError> {
    let crops = state.db.list_crops().await?;

    Ok(Json(CropsResponse {
        crops_count: crops.len(),
        crops,
    }))
}
