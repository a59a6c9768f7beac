//! Admin category endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};
use classifieds_common::AppResult;
use classifieds_core::{CategoryListingQuery, CategoryStats, Page, PageRequest};
use classifieds_db::entities::listing;

use crate::{extractors::{AdminContext, Query}, middleware::AppState, response::ApiResponse};

/// Listings of one category, highest priority first.
async fn category_posts(
    AdminContext(_admin): AdminContext,
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Query(filter): Query<CategoryListingQuery>,
    Query(page): Query<PageRequest>,
) -> AppResult<ApiResponse<Page<listing::Model>>> {
    let posts = state
        .listing_service
        .category_listings(&category_id, filter, page)
        .await?;
    Ok(ApiResponse::ok("Category posts retrieved successfully", posts))
}

/// Approval counts per category.
async fn stats(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<CategoryStats>>> {
    let stats = state.listing_service.category_stats(&admin).await?;
    Ok(ApiResponse::ok("Category statistics retrieved successfully", stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/{id}/posts", get(category_posts))
}
