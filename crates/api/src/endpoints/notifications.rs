//! Admin notification inbox endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use classifieds_common::AppResult;
use classifieds_db::entities::notification;
use serde::{Deserialize, Serialize};

use crate::{extractors::{AdminContext, Query}, middleware::AppState, response::ApiResponse};

/// List notifications query.
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    /// Maximum results (default: 20, max: 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}

const fn default_limit() -> u64 {
    20
}

/// Notifications with the unread counter.
#[derive(Serialize)]
pub struct NotificationsListResponse {
    pub notifications: Vec<notification::Model>,
    pub unread_count: u64,
}

async fn list(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<ApiResponse<NotificationsListResponse>> {
    let limit = query.limit.clamp(1, 100);
    let notifications = state
        .notification_service
        .list(&admin.user_id, query.unread_only, limit, query.offset)
        .await?;
    let unread_count = state
        .notification_service
        .count_unread(&admin.user_id)
        .await?;

    Ok(ApiResponse::ok(
        "Notifications retrieved successfully",
        NotificationsListResponse {
            notifications,
            unread_count,
        },
    ))
}

async fn mark_read(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<notification::Model>> {
    let notification = state
        .notification_service
        .mark_as_read(&admin.user_id, &id)
        .await?;
    Ok(ApiResponse::ok("Notification marked as read", notification))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}/read", post(mark_read))
}
