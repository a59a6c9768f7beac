//! Listing (advertisement) entity.

use sea_orm::{ActiveValue::Unchanged, Set, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Visibility status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ListingStatus {
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Moderation state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Placement assigned to a listing on approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum PostType {
    #[sea_orm(string_value = "regular")]
    #[default]
    Regular,
    #[sea_orm(string_value = "sponsored")]
    Sponsored,
    #[sea_orm(string_value = "promoted")]
    Promoted,
    #[sea_orm(string_value = "featured")]
    Featured,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl PostType {
    /// Any placement other than `regular` marks the listing as an admin post.
    #[must_use]
    pub fn is_admin_post(self) -> bool {
        self != Self::Regular
    }
}

/// Legacy promotion flags stored directly on the listing row.
///
/// Each flag is a boolean paired with an expiry timestamp; the flag only
/// counts while the expiry lies in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionFlag {
    Featured,
    Suggested,
    Paid,
    Promoted,
    Sponsored,
    Business,
    Store,
}

impl PromotionFlag {
    /// Ranking bonus contributed while the flag is effective.
    #[must_use]
    pub const fn bonus(self) -> i64 {
        match self {
            Self::Sponsored => 800,
            Self::Featured => 600,
            Self::Promoted => 400,
            Self::Suggested | Self::Paid | Self::Business | Self::Store => 0,
        }
    }

    /// The `(flag, expires_at)` column pair backing this promotion.
    #[must_use]
    pub const fn columns(self) -> (Column, Column) {
        match self {
            Self::Featured => (Column::IsFeatured, Column::FeaturedExpiresAt),
            Self::Suggested => (Column::IsSuggested, Column::SuggestedExpiresAt),
            Self::Paid => (Column::IsPaid, Column::PaidExpiresAt),
            Self::Promoted => (Column::IsPromoted, Column::PromotedExpiresAt),
            Self::Sponsored => (Column::IsSponsored, Column::SponsoredExpiresAt),
            Self::Business => (Column::IsBusiness, Column::BusinessExpiresAt),
            Self::Store => (Column::IsStore, Column::StoreExpiresAt),
        }
    }

    /// Wire name of the flag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Featured => "featured",
            Self::Suggested => "suggested",
            Self::Paid => "paid",
            Self::Promoted => "promoted",
            Self::Sponsored => "sponsored",
            Self::Business => "business",
            Self::Store => "store",
        }
    }
}

/// Listing model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listing")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning customer
    pub customer_id: String,

    pub category_id: String,

    pub title: String,

    #[sea_orm(unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(nullable)]
    pub location: Option<String>,

    /// ISO 4217 currency code
    pub currency: String,

    #[sea_orm(nullable)]
    pub price_cents: Option<i64>,

    pub status: ListingStatus,

    pub approval_status: ApprovalStatus,

    #[sea_orm(default_value = false)]
    pub is_harmful: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub moderation_notes: Option<String>,

    #[sea_orm(nullable)]
    pub approved_by: Option<String>,

    #[sea_orm(nullable)]
    pub approved_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    pub post_type: PostType,

    #[sea_orm(default_value = false)]
    pub is_admin_post: bool,

    // Legacy promotion flags
    pub is_featured: bool,
    #[sea_orm(nullable)]
    pub featured_expires_at: Option<DateTimeWithTimeZone>,
    pub is_suggested: bool,
    #[sea_orm(nullable)]
    pub suggested_expires_at: Option<DateTimeWithTimeZone>,
    pub is_paid: bool,
    #[sea_orm(nullable)]
    pub paid_expires_at: Option<DateTimeWithTimeZone>,
    pub is_promoted: bool,
    #[sea_orm(nullable)]
    pub promoted_expires_at: Option<DateTimeWithTimeZone>,
    pub is_sponsored: bool,
    #[sea_orm(nullable)]
    pub sponsored_expires_at: Option<DateTimeWithTimeZone>,
    pub is_business: bool,
    #[sea_orm(nullable)]
    pub business_expires_at: Option<DateTimeWithTimeZone>,
    pub is_store: bool,
    #[sea_orm(nullable)]
    pub store_expires_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub last_reposted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,

    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,

    #[sea_orm(has_many = "super::listing_upsell::Entity")]
    Upsells,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::listing_upsell::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Upsells.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Raw `(flag, expires_at)` pair for a legacy promotion.
    #[must_use]
    pub const fn promotion(&self, flag: PromotionFlag) -> (bool, Option<DateTimeWithTimeZone>) {
        match flag {
            PromotionFlag::Featured => (self.is_featured, self.featured_expires_at),
            PromotionFlag::Suggested => (self.is_suggested, self.suggested_expires_at),
            PromotionFlag::Paid => (self.is_paid, self.paid_expires_at),
            PromotionFlag::Promoted => (self.is_promoted, self.promoted_expires_at),
            PromotionFlag::Sponsored => (self.is_sponsored, self.sponsored_expires_at),
            PromotionFlag::Business => (self.is_business, self.business_expires_at),
            PromotionFlag::Store => (self.is_store, self.store_expires_at),
        }
    }

    /// Set a legacy promotion pair.
    pub fn set_promotion(
        &mut self,
        flag: PromotionFlag,
        enabled: bool,
        expires_at: Option<DateTimeWithTimeZone>,
    ) {
        let (slot, expiry) = match flag {
            PromotionFlag::Featured => (&mut self.is_featured, &mut self.featured_expires_at),
            PromotionFlag::Suggested => (&mut self.is_suggested, &mut self.suggested_expires_at),
            PromotionFlag::Paid => (&mut self.is_paid, &mut self.paid_expires_at),
            PromotionFlag::Promoted => (&mut self.is_promoted, &mut self.promoted_expires_at),
            PromotionFlag::Sponsored => (&mut self.is_sponsored, &mut self.sponsored_expires_at),
            PromotionFlag::Business => (&mut self.is_business, &mut self.business_expires_at),
            PromotionFlag::Store => (&mut self.is_store, &mut self.store_expires_at),
        };
        *slot = enabled;
        *expiry = expires_at;
    }

    /// A legacy flag is effective only while its expiry is in the future.
    #[must_use]
    pub fn is_promotion_active(&self, flag: PromotionFlag, now: DateTimeWithTimeZone) -> bool {
        match self.promotion(flag) {
            (true, Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }

    /// Whether customers can currently see this listing.
    #[must_use]
    pub fn is_publicly_visible(&self) -> bool {
        self.status == ListingStatus::Active
            && self.approval_status == ApprovalStatus::Approved
            && !self.is_harmful
    }

    /// Active model that writes back every moderation, visibility and
    /// promotion column of this model, keyed by its primary key.
    #[must_use]
    pub fn into_state_update(self) -> ActiveModel {
        ActiveModel {
            id: Unchanged(self.id),
            status: Set(self.status),
            approval_status: Set(self.approval_status),
            is_harmful: Set(self.is_harmful),
            moderation_notes: Set(self.moderation_notes),
            approved_by: Set(self.approved_by),
            approved_at: Set(self.approved_at),
            rejection_reason: Set(self.rejection_reason),
            post_type: Set(self.post_type),
            is_admin_post: Set(self.is_admin_post),
            is_featured: Set(self.is_featured),
            featured_expires_at: Set(self.featured_expires_at),
            is_suggested: Set(self.is_suggested),
            suggested_expires_at: Set(self.suggested_expires_at),
            is_paid: Set(self.is_paid),
            paid_expires_at: Set(self.paid_expires_at),
            is_promoted: Set(self.is_promoted),
            promoted_expires_at: Set(self.promoted_expires_at),
            is_sponsored: Set(self.is_sponsored),
            sponsored_expires_at: Set(self.sponsored_expires_at),
            is_business: Set(self.is_business),
            business_expires_at: Set(self.business_expires_at),
            is_store: Set(self.is_store),
            store_expires_at: Set(self.store_expires_at),
            last_reposted_at: Set(self.last_reposted_at),
            updated_at: Set(self.updated_at),
            ..Default::default()
        }
    }
}
