//! Customer listing endpoints.

use axum::{Router, extract::State, routing::get};
use classifieds_common::AppResult;
use classifieds_core::{CreateListingInput, Page, PageRequest};
use classifieds_db::entities::listing;
use serde::Deserialize;

use crate::{extractors::{AuthUser, Json, Query}, middleware::AppState, response::ApiResponse};

/// Public search query.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Ranked search over visible listings.
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Page<listing::Model>>> {
    let page = PageRequest {
        page: query.page,
        per_page: query.per_page,
    };
    let listings = state
        .listing_service
        .search_public(query.category_id, query.search, page)
        .await?;
    Ok(ApiResponse::ok("Listings retrieved successfully", listings))
}

/// Submit a listing for review.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateListingInput>,
) -> AppResult<ApiResponse<listing::Model>> {
    let listing = state.listing_service.create(&user.id, input).await?;
    Ok(ApiResponse::created(
        "Listing submitted and awaiting approval",
        listing,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search).post(create))
}
