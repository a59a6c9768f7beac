//! Admin post endpoints: maintenance, moderation queue, bulk actions, quick
//! actions, harmful content, priority and upsells.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use classifieds_common::AppResult;
use classifieds_core::{
    BulkAction, BulkActionInput, CreateAdminPostInput, CreateUpsellInput, Page, PageRequest,
    PriorityScore, QuickApproveInput, UpdateListingInput, UpsellView,
};
use classifieds_db::entities::listing::{self, PostType};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::{AdminContext, Json, Query}, middleware::AppState, response::ApiResponse};

/// Pending queue query.
#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    pub category_id: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Bulk approve request.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkApproveRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 posts."))]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub post_type: PostType,
}

/// Bulk approve response.
#[derive(Debug, Serialize)]
pub struct BulkApproveResponse {
    pub approved_count: u64,
    pub post_type: PostType,
}

/// Bulk reject request.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkRejectRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 posts."))]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub reason: String,
}

/// Bulk reject response.
#[derive(Debug, Serialize)]
pub struct BulkRejectResponse {
    pub rejected_count: u64,
    pub reason: String,
}

/// Bulk action response.
#[derive(Debug, Serialize)]
pub struct BulkActionResponse {
    pub action: BulkAction,
    pub affected_count: u64,
}

/// Request carrying a moderation reason.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

// ==================== Maintenance ====================

async fn create(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Json(input): Json<CreateAdminPostInput>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state.listing_service.create_admin_post(&admin, input).await?;
    Ok(ApiResponse::created("Post created successfully", post))
}

async fn show(
    AdminContext(_admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state.listing_service.get(&id).await?;
    Ok(ApiResponse::ok("Post retrieved successfully", post))
}

async fn update(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateListingInput>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state.listing_service.update(&admin, &id, input).await?;
    Ok(ApiResponse::ok("Post updated successfully", post))
}

async fn destroy(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Option<()>>> {
    state.listing_service.delete(&admin, &id).await?;
    Ok(ApiResponse::ok("Post deleted successfully", None))
}

// ==================== Moderation queue ====================

async fn pending(
    AdminContext(_admin): AdminContext,
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> AppResult<ApiResponse<Page<listing::Model>>> {
    let page = PageRequest {
        page: query.page,
        per_page: query.per_page,
    };
    let posts = state
        .listing_service
        .pending(query.category_id.as_deref(), page)
        .await?;
    Ok(ApiResponse::ok("Pending posts retrieved successfully", posts))
}

// ==================== Bulk actions ====================

async fn bulk_approve(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Json(req): Json<BulkApproveRequest>,
) -> AppResult<ApiResponse<BulkApproveResponse>> {
    req.validate()?;
    let approved_count = state
        .moderation_service
        .bulk_approve(&admin, &req.post_ids, req.post_type)
        .await?;

    Ok(ApiResponse::ok(
        format!("{approved_count} posts approved successfully"),
        BulkApproveResponse {
            approved_count,
            post_type: req.post_type,
        },
    ))
}

async fn bulk_reject(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Json(req): Json<BulkRejectRequest>,
) -> AppResult<ApiResponse<BulkRejectResponse>> {
    req.validate()?;
    let rejected_count = state
        .moderation_service
        .bulk_reject(&admin, &req.post_ids, &req.reason)
        .await?;

    Ok(ApiResponse::ok(
        format!("{rejected_count} posts rejected successfully"),
        BulkRejectResponse {
            rejected_count,
            reason: req.reason.trim().to_string(),
        },
    ))
}

async fn bulk_action(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Json(input): Json<BulkActionInput>,
) -> AppResult<ApiResponse<BulkActionResponse>> {
    let action = input.action;
    let affected_count = state.moderation_service.bulk_action(&admin, input).await?;

    Ok(ApiResponse::ok(
        format!("Bulk action completed on {affected_count} posts"),
        BulkActionResponse {
            action,
            affected_count,
        },
    ))
}

// ==================== Quick actions ====================

async fn quick_approve(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    input: Option<Json<QuickApproveInput>>,
) -> AppResult<ApiResponse<listing::Model>> {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    let post = state
        .moderation_service
        .quick_approve(&admin, &id, input)
        .await?;
    Ok(ApiResponse::ok("Post approved successfully", post))
}

async fn quick_reject(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state
        .moderation_service
        .quick_reject(&admin, &id, &req.reason)
        .await?;
    Ok(ApiResponse::ok("Post rejected successfully", post))
}

// ==================== Harmful content ====================

async fn mark_harmful(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state
        .moderation_service
        .mark_harmful(&admin, &id, &req.reason)
        .await?;
    Ok(ApiResponse::ok("Post marked as harmful", post))
}

async fn restore_harmful(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<listing::Model>> {
    let post = state.moderation_service.restore_harmful(&admin, &id).await?;
    Ok(ApiResponse::ok("Post restored and awaiting approval", post))
}

// ==================== Priority & upsells ====================

async fn priority(
    AdminContext(_admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PriorityScore>> {
    let score = state.listing_service.score_breakdown(&id).await?;
    Ok(ApiResponse::ok("Priority score retrieved successfully", score))
}

async fn list_upsells(
    AdminContext(_admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<UpsellView>>> {
    let now = chrono::Utc::now().into();
    let upsells = state
        .upsell_service
        .list_for_listing(&id)
        .await?
        .into_iter()
        .map(|record| UpsellView::at(record, now))
        .collect();
    Ok(ApiResponse::ok("Upsells retrieved successfully", upsells))
}

async fn create_upsell(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CreateUpsellInput>,
) -> AppResult<ApiResponse<UpsellView>> {
    admin.require_manage_listings()?;
    let upsell = state.upsell_service.create(&id, input).await?;
    Ok(ApiResponse::created(
        "Upsell created and awaiting payment",
        UpsellView::at(upsell, chrono::Utc::now().into()),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/pending", get(pending))
        .route("/bulk-approve", post(bulk_approve))
        .route("/bulk-reject", post(bulk_reject))
        .route("/bulk-action", post(bulk_action))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/quick-approve", post(quick_approve))
        .route("/{id}/quick-reject", post(quick_reject))
        .route("/{id}/mark-harmful", post(mark_harmful))
        .route("/{id}/restore-harmful", post(restore_harmful))
        .route("/{id}/priority", get(priority))
        .route("/{id}/upsells", get(list_upsells).post(create_upsell))
}
