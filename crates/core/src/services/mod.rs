//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod listing;
pub mod moderation;
pub mod notification;
pub mod ranking;
pub mod upsell;

pub use auth::{Capabilities, PERMISSION_SET_VERSION, PermissionSet};
pub use listing::{
    CategoryListingQuery, CategoryStats, CreateAdminPostInput, CreateListingInput, ListingService,
    Page, PageRequest, ResolvedPage, UpdateListingInput,
};
pub use moderation::{
    BulkAction, BulkActionInput, ModerationService, QuickApproveInput, SpecialPromotion,
    TransitionError,
};
pub use notification::{AdminNotifier, AdminNotifierService, NoOpAdminNotifier, NotificationService};
pub use ranking::{PriorityScore, ScoreContribution, ScoreSource};
pub use upsell::{CreateUpsellInput, UpsellService, UpsellView};
