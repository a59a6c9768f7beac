//! Listing moderation.
//!
//! [`transition`] holds the state machine as plain functions over a listing
//! model. They check their own preconditions and leave the model untouched
//! when they refuse. [`ModerationService`] loads, transitions and persists.

use std::collections::BTreeSet;

use classifieds_common::{AppError, AppResult, config::ModerationConfig};
use classifieds_db::{
    entities::{
        listing::{self, PostType, PromotionFlag},
        notification::NotificationType,
    },
    repositories::ListingRepository,
};
use chrono::Duration;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use validator::Validate;

use crate::services::{
    auth::Capabilities,
    notification::{AdminNotifierService, notify_best_effort},
};

/// Why a listing refused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Listing {0} is not pending approval")]
    NotPending(String),

    #[error("Listing {0} is not marked as harmful")]
    NotHarmful(String),

    #[error("Listing {0} is marked as harmful and must be restored first")]
    Harmful(String),

    #[error("Listing {0} is already active")]
    AlreadyActive(String),

    #[error("Listing {0} is already inactive")]
    AlreadyInactive(String),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

/// The moderation state machine.
pub mod transition {
    use super::{DateTimeWithTimeZone, PostType, TransitionError, listing};
    use classifieds_db::entities::listing::{ApprovalStatus, ListingStatus};

    fn reset_approval(listing: &mut listing::Model) {
        listing.approval_status = ApprovalStatus::Pending;
        listing.approved_by = None;
        listing.approved_at = None;
        listing.rejection_reason = None;
    }

    /// pending -> approved.
    pub fn approve(
        listing: &mut listing::Model,
        admin_id: &str,
        post_type: PostType,
        now: DateTimeWithTimeZone,
    ) -> Result<(), TransitionError> {
        if listing.approval_status != ApprovalStatus::Pending {
            return Err(TransitionError::NotPending(listing.id.clone()));
        }

        listing.approval_status = ApprovalStatus::Approved;
        listing.approved_by = Some(admin_id.to_string());
        listing.approved_at = Some(now);
        listing.rejection_reason = None;
        listing.post_type = post_type;
        listing.is_admin_post = post_type.is_admin_post();
        listing.updated_at = Some(now);
        Ok(())
    }

    /// pending -> rejected. Approval metadata is left as is.
    pub fn reject(
        listing: &mut listing::Model,
        reason: &str,
        now: DateTimeWithTimeZone,
    ) -> Result<(), TransitionError> {
        if listing.approval_status != ApprovalStatus::Pending {
            return Err(TransitionError::NotPending(listing.id.clone()));
        }

        listing.approval_status = ApprovalStatus::Rejected;
        listing.rejection_reason = Some(reason.to_string());
        listing.updated_at = Some(now);
        Ok(())
    }

    /// Flag as harmful from any state. Approval status is not touched.
    pub fn mark_harmful(listing: &mut listing::Model, reason: &str, now: DateTimeWithTimeZone) {
        listing.is_harmful = true;
        listing.status = ListingStatus::Inactive;
        listing.moderation_notes = Some(reason.to_string());
        listing.updated_at = Some(now);
    }

    /// harmful -> pending, visible again once re-approved.
    pub fn restore_harmful(
        listing: &mut listing::Model,
        now: DateTimeWithTimeZone,
    ) -> Result<(), TransitionError> {
        if !listing.is_harmful {
            return Err(TransitionError::NotHarmful(listing.id.clone()));
        }

        listing.is_harmful = false;
        listing.moderation_notes = None;
        listing.status = ListingStatus::Active;
        reset_approval(listing);
        listing.updated_at = Some(now);
        Ok(())
    }

    /// Repost: inactive -> active, which always sends the listing back to
    /// the moderation queue.
    pub fn reactivate(
        listing: &mut listing::Model,
        now: DateTimeWithTimeZone,
    ) -> Result<(), TransitionError> {
        if listing.is_harmful {
            return Err(TransitionError::Harmful(listing.id.clone()));
        }
        if listing.status == ListingStatus::Active {
            return Err(TransitionError::AlreadyActive(listing.id.clone()));
        }

        listing.status = ListingStatus::Active;
        listing.last_reposted_at = Some(now);
        reset_approval(listing);
        listing.updated_at = Some(now);
        Ok(())
    }

    /// active -> inactive.
    pub fn deactivate(
        listing: &mut listing::Model,
        now: DateTimeWithTimeZone,
    ) -> Result<(), TransitionError> {
        if listing.status == ListingStatus::Inactive {
            return Err(TransitionError::AlreadyInactive(listing.id.clone()));
        }

        listing.status = ListingStatus::Inactive;
        listing.updated_at = Some(now);
        Ok(())
    }
}

/// Actions accepted by the generic bulk endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Approve,
    Reject,
    MarkHarmful,
    RestoreHarmful,
    Activate,
    Deactivate,
    Delete,
}

/// Input for a generic bulk action.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkActionInput {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 posts."))]
    pub post_ids: Vec<String>,
    pub action: BulkAction,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    pub post_type: Option<PostType>,
}

/// Legacy promotion a super-admin may attach on quick approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialPromotion {
    Sponsored,
    Promoted,
    Featured,
}

impl SpecialPromotion {
    /// Post type a listing approved with this promotion gets unless the
    /// moderator picks one.
    #[must_use]
    pub const fn post_type(self) -> PostType {
        match self {
            Self::Sponsored => PostType::Sponsored,
            Self::Promoted => PostType::Promoted,
            Self::Featured => PostType::Featured,
        }
    }

    /// Legacy flag set by this promotion.
    #[must_use]
    pub const fn flag(self) -> PromotionFlag {
        match self {
            Self::Sponsored => PromotionFlag::Sponsored,
            Self::Promoted => PromotionFlag::Promoted,
            Self::Featured => PromotionFlag::Featured,
        }
    }
}

/// Input for quick approval.
#[derive(Debug, Default, Deserialize)]
pub struct QuickApproveInput {
    pub post_type: Option<PostType>,
    pub make_special: Option<SpecialPromotion>,
}

impl QuickApproveInput {
    /// The chosen post type, else the tier of the special promotion, else
    /// regular.
    #[must_use]
    pub fn resolved_post_type(&self) -> PostType {
        self.post_type
            .or_else(|| self.make_special.map(SpecialPromotion::post_type))
            .unwrap_or_default()
    }
}

fn required_reason(reason: Option<&str>) -> AppResult<String> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => {
            if reason.chars().count() > 1000 {
                return Err(AppError::field(
                    "reason",
                    "The reason may not be greater than 1000 characters.",
                ));
            }
            Ok(reason.to_string())
        }
        _ => Err(AppError::field("reason", "The reason field is required.")),
    }
}

fn unique_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

/// Moderation service.
#[derive(Clone)]
pub struct ModerationService {
    listing_repo: ListingRepository,
    notifier: AdminNotifierService,
    special_promotion_days: i64,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub fn new(
        listing_repo: ListingRepository,
        notifier: AdminNotifierService,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            listing_repo,
            notifier,
            special_promotion_days: config.special_promotion_days,
        }
    }

    /// Approve a pending listing.
    pub async fn approve(
        &self,
        admin: &Capabilities,
        id: &str,
        post_type: PostType,
    ) -> AppResult<listing::Model> {
        self.quick_approve(
            admin,
            id,
            QuickApproveInput {
                post_type: Some(post_type),
                make_special: None,
            },
        )
        .await
    }

    /// Approve a pending listing, optionally attaching a special promotion
    /// for the configured window. Attaching one requires super-admin.
    pub async fn quick_approve(
        &self,
        admin: &Capabilities,
        id: &str,
        input: QuickApproveInput,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;
        if input.make_special.is_some() {
            admin.require_super_admin()?;
        }

        let now = now();
        let post_type = input.resolved_post_type();
        let mut listing = self.listing_repo.get_by_id(id).await?;

        transition::approve(&mut listing, &admin.user_id, post_type, now)?;
        if let Some(special) = input.make_special {
            let expires_at = now + Duration::days(self.special_promotion_days);
            listing.set_promotion(special.flag(), true, Some(expires_at));
        }

        let saved = self.listing_repo.save_state(listing).await?;
        tracing::info!(
            listing_id = %saved.id,
            admin_id = %admin.user_id,
            post_type = ?saved.post_type,
            special = ?input.make_special,
            "Listing approved"
        );
        Ok(saved)
    }

    /// Reject a pending listing.
    pub async fn reject(
        &self,
        admin: &Capabilities,
        id: &str,
        reason: &str,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;
        let reason = required_reason(Some(reason))?;

        let mut listing = self.listing_repo.get_by_id(id).await?;
        transition::reject(&mut listing, &reason, now())?;

        let saved = self.listing_repo.save_state(listing).await?;
        tracing::info!(listing_id = %saved.id, admin_id = %admin.user_id, "Listing rejected");
        Ok(saved)
    }

    /// Reject a pending listing from the review queue.
    pub async fn quick_reject(
        &self,
        admin: &Capabilities,
        id: &str,
        reason: &str,
    ) -> AppResult<listing::Model> {
        self.reject(admin, id, reason).await
    }

    /// Flag a listing as harmful and alert the other administrators.
    pub async fn mark_harmful(
        &self,
        admin: &Capabilities,
        id: &str,
        reason: &str,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;
        let reason = required_reason(Some(reason))?;

        let mut listing = self.listing_repo.get_by_id(id).await?;
        transition::mark_harmful(&mut listing, &reason, now());

        let saved = self.listing_repo.save_state(listing).await?;
        tracing::warn!(listing_id = %saved.id, admin_id = %admin.user_id, reason = %reason, "Listing marked as harmful");

        notify_best_effort(
            &self.notifier,
            NotificationType::HarmfulContent,
            &format!("Listing \"{}\" was marked as harmful: {reason}", saved.title),
            json!({
                "listing_id": saved.id,
                "reason": reason,
                "flagged_by": admin.user_id,
            }),
        )
        .await;

        Ok(saved)
    }

    /// Clear the harmful flag; the listing goes back to the review queue.
    pub async fn restore_harmful(
        &self,
        admin: &Capabilities,
        id: &str,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;

        let mut listing = self.listing_repo.get_by_id(id).await?;
        transition::restore_harmful(&mut listing, now())?;

        let saved = self.listing_repo.save_state(listing).await?;
        tracing::info!(listing_id = %saved.id, admin_id = %admin.user_id, "Listing restored from harmful");
        Ok(saved)
    }

    /// Approve every pending listing among `ids`, returning how many were.
    pub async fn bulk_approve(
        &self,
        admin: &Capabilities,
        ids: &[String],
        post_type: PostType,
    ) -> AppResult<u64> {
        admin.require_manage_listings()?;
        let now = now();
        let count = self
            .apply_to_each(ids, |listing| {
                transition::approve(listing, &admin.user_id, post_type, now)
            })
            .await?;

        tracing::info!(admin_id = %admin.user_id, requested = ids.len(), approved = count, "Bulk approval");
        Ok(count)
    }

    /// Reject every pending listing among `ids`, returning how many were.
    pub async fn bulk_reject(
        &self,
        admin: &Capabilities,
        ids: &[String],
        reason: &str,
    ) -> AppResult<u64> {
        admin.require_manage_listings()?;
        let reason = required_reason(Some(reason))?;
        let now = now();
        let count = self
            .apply_to_each(ids, |listing| transition::reject(listing, &reason, now))
            .await?;

        tracing::info!(admin_id = %admin.user_id, requested = ids.len(), rejected = count, "Bulk rejection");
        Ok(count)
    }

    /// Apply one action to every listing in the input that allows it.
    pub async fn bulk_action(&self, admin: &Capabilities, input: BulkActionInput) -> AppResult<u64> {
        admin.require_manage_listings()?;
        input.validate()?;

        let now = now();
        let count = match input.action {
            BulkAction::Approve => {
                let post_type = input.post_type.unwrap_or_default();
                self.apply_to_each(&input.post_ids, |listing| {
                    transition::approve(listing, &admin.user_id, post_type, now)
                })
                .await?
            }
            BulkAction::Reject => {
                let reason = required_reason(input.reason.as_deref())?;
                self.apply_to_each(&input.post_ids, |listing| {
                    transition::reject(listing, &reason, now)
                })
                .await?
            }
            BulkAction::MarkHarmful => {
                let reason = required_reason(input.reason.as_deref())?;
                let flagged = self
                    .transition_each(&input.post_ids, |listing| {
                        transition::mark_harmful(listing, &reason, now);
                        Ok(())
                    })
                    .await?;
                if !flagged.is_empty() {
                    notify_best_effort(
                        &self.notifier,
                        NotificationType::HarmfulContent,
                        &format!("{} listings were marked as harmful: {reason}", flagged.len()),
                        json!({
                            "listing_ids": flagged,
                            "reason": reason,
                            "flagged_by": admin.user_id,
                        }),
                    )
                    .await;
                }
                flagged.len() as u64
            }
            BulkAction::RestoreHarmful => {
                self.apply_to_each(&input.post_ids, |listing| {
                    transition::restore_harmful(listing, now)
                })
                .await?
            }
            BulkAction::Activate => {
                self.apply_to_each(&input.post_ids, |listing| {
                    transition::reactivate(listing, now)
                })
                .await?
            }
            BulkAction::Deactivate => {
                self.apply_to_each(&input.post_ids, |listing| {
                    transition::deactivate(listing, now)
                })
                .await?
            }
            BulkAction::Delete => {
                self.listing_repo
                    .delete_many(&unique_ids(&input.post_ids))
                    .await?
            }
        };

        tracing::info!(
            admin_id = %admin.user_id,
            action = ?input.action,
            requested = input.post_ids.len(),
            affected = count,
            "Bulk action"
        );
        Ok(count)
    }

    /// Like [`Self::transition_each`], returning only how many changed.
    async fn apply_to_each<F>(&self, ids: &[String], apply: F) -> AppResult<u64>
    where
        F: FnMut(&mut listing::Model) -> Result<(), TransitionError>,
    {
        Ok(self.transition_each(ids, apply).await?.len() as u64)
    }

    /// Load the listings, transition the ones that allow it and persist them
    /// in one transaction. Refusals and unknown IDs are skipped; the IDs of
    /// the listings that changed are returned.
    async fn transition_each<F>(&self, ids: &[String], mut apply: F) -> AppResult<Vec<String>>
    where
        F: FnMut(&mut listing::Model) -> Result<(), TransitionError>,
    {
        let listings = self.listing_repo.find_by_ids(&unique_ids(ids)).await?;

        let mut changed = Vec::with_capacity(listings.len());
        for mut listing in listings {
            match apply(&mut listing) {
                Ok(()) => changed.push(listing),
                Err(e) => tracing::debug!(listing_id = %listing.id, reason = %e, "Skipping listing"),
            }
        }

        let changed_ids = changed.iter().map(|l| l.id.clone()).collect();
        self.listing_repo.save_states(changed).await?;
        Ok(changed_ids)
    }
}
