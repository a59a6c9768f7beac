//! Listing upsell repository.

use std::sync::Arc;

use crate::entities::{ListingUpsell, listing_upsell};
use classifieds_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Upsell repository for database operations.
#[derive(Clone)]
pub struct UpsellRepository {
    db: Arc<DatabaseConnection>,
}

impl UpsellRepository {
    /// Create a new upsell repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an upsell by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<listing_upsell::Model>> {
        ListingUpsell::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an upsell by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<listing_upsell::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upsell: {id}")))
    }

    /// Create a new upsell.
    pub async fn create(
        &self,
        model: listing_upsell::ActiveModel,
    ) -> AppResult<listing_upsell::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an upsell.
    pub async fn update(
        &self,
        model: listing_upsell::ActiveModel,
    ) -> AppResult<listing_upsell::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All upsells of a listing, newest first.
    pub async fn find_by_listing(&self, listing_id: &str) -> AppResult<Vec<listing_upsell::Model>> {
        ListingUpsell::find()
            .filter(listing_upsell::Column::ListingId.eq(listing_id))
            .order_by_desc(listing_upsell::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All upsells of several listings.
    pub async fn find_by_listings(
        &self,
        listing_ids: &[String],
    ) -> AppResult<Vec<listing_upsell::Model>> {
        if listing_ids.is_empty() {
            return Ok(vec![]);
        }

        ListingUpsell::find()
            .filter(listing_upsell::Column::ListingId.is_in(listing_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
