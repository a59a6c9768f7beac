//! Admin upsell lifecycle endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::post,
};
use classifieds_common::AppResult;
use classifieds_core::UpsellView;
use serde::Deserialize;

use crate::{extractors::{AdminContext, Json}, middleware::AppState, response::ApiResponse};

/// Record payment request.
#[derive(Debug, Default, Deserialize)]
pub struct RecordPaymentRequest {
    pub payment_reference: Option<String>,
}

fn view(record: classifieds_db::entities::listing_upsell::Model) -> UpsellView {
    UpsellView::at(record, chrono::Utc::now().into())
}

async fn record_payment(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Option<Json<RecordPaymentRequest>>,
) -> AppResult<ApiResponse<UpsellView>> {
    admin.require_manage_listings()?;
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let upsell = state
        .upsell_service
        .record_payment(&id, req.payment_reference)
        .await?;
    Ok(ApiResponse::ok("Payment recorded", view(upsell)))
}

async fn activate(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UpsellView>> {
    admin.require_manage_listings()?;
    let upsell = state.upsell_service.activate(&id).await?;
    Ok(ApiResponse::ok("Upsell activated", view(upsell)))
}

async fn expire(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UpsellView>> {
    admin.require_manage_listings()?;
    let upsell = state.upsell_service.mark_as_expired(&id).await?;
    Ok(ApiResponse::ok("Upsell marked as expired", view(upsell)))
}

async fn cancel(
    AdminContext(admin): AdminContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UpsellView>> {
    admin.require_manage_listings()?;
    let upsell = state.upsell_service.cancel(&id).await?;
    Ok(ApiResponse::ok("Upsell cancelled", view(upsell)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/payment", post(record_payment))
        .route("/{id}/activate", post(activate))
        .route("/{id}/expire", post(expire))
        .route("/{id}/cancel", post(cancel))
}
