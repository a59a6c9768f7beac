//! Upsell service.
//!
//! Lifecycle transitions never refuse on business grounds; only a missing
//! record or a failed write surfaces as an error.

use classifieds_common::{AppResult, IdGenerator};
use classifieds_db::{
    entities::listing_upsell::{self, PaymentStatus, UpsellStatus, UpsellType},
    repositories::{ListingRepository, UpsellRepository},
};
use chrono::Duration;
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Pure lifecycle steps over an upsell record.
pub mod lifecycle {
    use super::{DateTimeWithTimeZone, Duration, PaymentStatus, UpsellStatus, listing_upsell};

    /// Start the window now. An expiry already set is kept.
    pub fn activate(upsell: &mut listing_upsell::Model, now: DateTimeWithTimeZone) {
        upsell.status = UpsellStatus::Active;
        upsell.starts_at = Some(now);
        if upsell.expires_at.is_none() && upsell.duration_days > 0 {
            upsell.expires_at = Some(now + Duration::days(i64::from(upsell.duration_days)));
        }
        upsell.updated_at = Some(now);
    }

    /// Record a successful payment.
    pub fn record_payment(
        upsell: &mut listing_upsell::Model,
        reference: Option<String>,
        now: DateTimeWithTimeZone,
    ) {
        upsell.payment_status = PaymentStatus::Paid;
        if reference.is_some() {
            upsell.payment_reference = reference;
        }
        upsell.updated_at = Some(now);
    }

    pub fn mark_as_expired(upsell: &mut listing_upsell::Model, now: DateTimeWithTimeZone) {
        upsell.status = UpsellStatus::Expired;
        upsell.updated_at = Some(now);
    }

    pub fn cancel(upsell: &mut listing_upsell::Model, now: DateTimeWithTimeZone) {
        upsell.status = UpsellStatus::Cancelled;
        upsell.updated_at = Some(now);
    }
}

/// Input for purchasing an upsell.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUpsellInput {
    pub upsell_type: UpsellType,
    #[validate(range(min = 0, message = "The price may not be negative."))]
    pub price_cents: i64,
    #[validate(length(equal = 3, message = "The currency must be a 3-letter code."))]
    pub currency: String,
    #[validate(range(min = 1, max = 365, message = "The duration must be between 1 and 365 days."))]
    pub duration_days: i32,
    #[validate(length(max = 255))]
    pub payment_reference: Option<String>,
}

/// An upsell with its computed flags.
#[derive(Debug, Clone, Serialize)]
pub struct UpsellView {
    #[serde(flatten)]
    pub record: listing_upsell::Model,
    pub is_active: bool,
    pub is_valid: bool,
}

impl UpsellView {
    #[must_use]
    pub fn at(record: listing_upsell::Model, now: DateTimeWithTimeZone) -> Self {
        Self {
            is_active: record.is_active(now),
            is_valid: record.is_valid(now),
            record,
        }
    }
}

fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

/// Upsell service.
#[derive(Clone)]
pub struct UpsellService {
    upsell_repo: UpsellRepository,
    listing_repo: ListingRepository,
    id_gen: IdGenerator,
}

impl UpsellService {
    /// Create a new upsell service.
    #[must_use]
    pub const fn new(upsell_repo: UpsellRepository, listing_repo: ListingRepository) -> Self {
        Self {
            upsell_repo,
            listing_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an upsell awaiting payment.
    pub async fn create(
        &self,
        listing_id: &str,
        input: CreateUpsellInput,
    ) -> AppResult<listing_upsell::Model> {
        input.validate()?;
        let listing = self.listing_repo.get_by_id(listing_id).await?;

        let model = listing_upsell::ActiveModel {
            id: Set(self.id_gen.generate()),
            listing_id: Set(listing.id),
            upsell_type: Set(input.upsell_type.as_str().to_string()),
            price_cents: Set(input.price_cents),
            currency: Set(input.currency.to_uppercase()),
            duration_days: Set(input.duration_days),
            starts_at: Set(None),
            expires_at: Set(None),
            status: Set(UpsellStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            payment_reference: Set(input.payment_reference),
            created_at: Set(now()),
            updated_at: Set(None),
        };

        let created = self.upsell_repo.create(model).await?;
        tracing::info!(
            upsell_id = %created.id,
            listing_id = %created.listing_id,
            upsell_type = %created.upsell_type,
            "Upsell created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: &str) -> AppResult<listing_upsell::Model> {
        self.upsell_repo.get_by_id(id).await
    }

    /// Upsells of a listing, newest first.
    pub async fn list_for_listing(&self, listing_id: &str) -> AppResult<Vec<listing_upsell::Model>> {
        self.listing_repo.get_by_id(listing_id).await?;
        self.upsell_repo.find_by_listing(listing_id).await
    }

    pub async fn record_payment(
        &self,
        id: &str,
        reference: Option<String>,
    ) -> AppResult<listing_upsell::Model> {
        self.transition(id, "payment recorded", |upsell, now| {
            lifecycle::record_payment(upsell, reference, now);
        })
        .await
    }

    pub async fn activate(&self, id: &str) -> AppResult<listing_upsell::Model> {
        self.transition(id, "activated", lifecycle::activate).await
    }

    pub async fn mark_as_expired(&self, id: &str) -> AppResult<listing_upsell::Model> {
        self.transition(id, "expired", lifecycle::mark_as_expired)
            .await
    }

    pub async fn cancel(&self, id: &str) -> AppResult<listing_upsell::Model> {
        self.transition(id, "cancelled", lifecycle::cancel).await
    }

    async fn transition<F>(&self, id: &str, label: &str, apply: F) -> AppResult<listing_upsell::Model>
    where
        F: FnOnce(&mut listing_upsell::Model, DateTimeWithTimeZone),
    {
        let mut upsell = self.upsell_repo.get_by_id(id).await?;
        apply(&mut upsell, now());

        let saved = self
            .upsell_repo
            .update(upsell.into_lifecycle_update())
            .await?;
        tracing::info!(upsell_id = %saved.id, status = ?saved.status, "Upsell {label}");
        Ok(saved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::ranking::tests::{active_upsell, create_test_listing};
    use chrono::Utc;
    use classifieds_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn pending_upsell(id: &str, duration_days: i32) -> listing_upsell::Model {
        listing_upsell::Model {
            starts_at: None,
            expires_at: None,
            status: UpsellStatus::Pending,
            payment_status: PaymentStatus::Pending,
            duration_days,
            ..active_upsell(id, "l1", "featured")
        }
    }

    fn service(db: MockDatabase) -> UpsellService {
        let db = Arc::new(db.into_connection());
        UpsellService::new(UpsellRepository::new(db.clone()), ListingRepository::new(db))
    }

    #[test]
    fn test_activate_opens_window_from_duration() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut upsell = pending_upsell("u1", 7);

        lifecycle::activate(&mut upsell, now);

        assert_eq!(upsell.status, UpsellStatus::Active);
        assert_eq!(upsell.starts_at, Some(now));
        assert_eq!(upsell.expires_at, Some(now + Duration::days(7)));
        assert!(upsell.is_active(now));
        assert!(!upsell.is_valid(now), "not paid yet");
    }

    #[test]
    fn test_activate_keeps_existing_expiry() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut upsell = pending_upsell("u1", 7);
        let fixed = now + Duration::days(2);
        upsell.expires_at = Some(fixed);

        lifecycle::activate(&mut upsell, now);

        assert_eq!(upsell.expires_at, Some(fixed));
    }

    #[test]
    fn test_activate_without_duration_stays_inactive() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut upsell = pending_upsell("u1", 0);

        lifecycle::activate(&mut upsell, now);

        assert_eq!(upsell.status, UpsellStatus::Active);
        assert!(upsell.expires_at.is_none());
        assert!(!upsell.is_active(now));
    }

    #[test]
    fn test_activating_lapsed_record_is_allowed() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut upsell = pending_upsell("u1", 7);
        upsell.expires_at = Some(now - Duration::days(1));
        lifecycle::mark_as_expired(&mut upsell, now);

        lifecycle::activate(&mut upsell, now);

        assert_eq!(upsell.status, UpsellStatus::Active);
        assert!(!upsell.is_active(now));
    }

    #[test]
    fn test_paid_and_active_is_valid() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut upsell = pending_upsell("u1", 30);

        lifecycle::record_payment(&mut upsell, Some("ch_123".to_string()), now);
        lifecycle::activate(&mut upsell, now);

        assert_eq!(upsell.payment_reference.as_deref(), Some("ch_123"));
        assert!(upsell.is_valid(now));

        lifecycle::cancel(&mut upsell, now);
        assert!(!upsell.is_active(now));
        assert!(!upsell.is_valid(now));
    }

    #[test]
    fn test_view_reports_flags() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let view = UpsellView::at(active_upsell("u1", "l1", "premium"), now);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["is_active"], true);
        assert_eq!(json["is_valid"], true);
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let created = pending_upsell("u1", 14);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_listing("l1")]])
            .append_query_results([[created]]);

        let input = CreateUpsellInput {
            upsell_type: UpsellType::Featured,
            price_cents: 2_500,
            currency: "usd".to_string(),
            duration_days: 14,
            payment_reference: None,
        };
        let upsell = service(db).create("l1", input).await.unwrap();

        assert_eq!(upsell.status, UpsellStatus::Pending);
        assert_eq!(upsell.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_for_missing_listing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<classifieds_db::entities::listing::Model>::new()]);

        let input = CreateUpsellInput {
            upsell_type: UpsellType::Premium,
            price_cents: 9_900,
            currency: "USD".to_string(),
            duration_days: 30,
            payment_reference: None,
        };
        let result = service(db).create("missing", input).await;

        assert!(matches!(result, Err(AppError::ListingNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_validates_duration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let input = CreateUpsellInput {
            upsell_type: UpsellType::Priority,
            price_cents: 500,
            currency: "USD".to_string(),
            duration_days: 0,
            payment_reference: None,
        };
        let result = service(db).create("l1", input).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_cancel_missing_upsell() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<listing_upsell::Model>::new()]);

        let result = service(db).cancel("nope").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_activate_persists() {
        let pending = pending_upsell("u1", 7);
        let mut activated = pending.clone();
        lifecycle::activate(&mut activated, Utc::now().into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pending]])
            .append_query_results([[activated]]);

        let saved = service(db).activate("u1").await.unwrap();

        assert_eq!(saved.status, UpsellStatus::Active);
        assert!(saved.expires_at.is_some());
    }
}
