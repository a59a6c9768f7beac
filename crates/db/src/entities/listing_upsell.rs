//! Listing upsell entity: one paid, time-boxed promotion purchase.

use std::fmt;
use std::str::FromStr;

use sea_orm::{ActiveValue::Unchanged, Set, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Closed set of upsell tiers.
///
/// Stored as free text so that rows written with a tier this build does not
/// know about still load; such rows rank with weight 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsellType {
    Priority,
    Featured,
    Sponsored,
    Premium,
}

impl UpsellType {
    /// Ranking weight of an active upsell of this tier.
    #[must_use]
    pub const fn weight(self) -> i64 {
        match self {
            Self::Premium => 1000,
            Self::Sponsored => 800,
            Self::Featured => 600,
            Self::Priority => 400,
        }
    }

    /// Stored name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Featured => "featured",
            Self::Sponsored => "sponsored",
            Self::Premium => "premium",
        }
    }
}

impl fmt::Display for UpsellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpsellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::Priority),
            "featured" => Ok(Self::Featured),
            "sponsored" => Ok(Self::Sponsored),
            "premium" => Ok(Self::Premium),
            other => Err(format!("unknown upsell type: {other}")),
        }
    }
}

/// Upsell record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum UpsellStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Payment state of the purchase behind an upsell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "listing_upsell")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub listing_id: String,

    /// Tier name, see [`UpsellType`]
    pub upsell_type: String,

    pub price_cents: i64,

    pub currency: String,

    pub duration_days: i32,

    #[sea_orm(nullable)]
    pub starts_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub status: UpsellStatus,

    pub payment_status: PaymentStatus,

    #[sea_orm(nullable)]
    pub payment_reference: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::listing::Entity",
        from = "Column::ListingId",
        to = "super::listing::Column::Id",
        on_delete = "Cascade"
    )]
    Listing,
}

impl Related<super::listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Listing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed tier, `None` for names this build does not know.
    #[must_use]
    pub fn kind(&self) -> Option<UpsellType> {
        self.upsell_type.parse().ok()
    }

    /// Ranking weight; unknown tiers weigh nothing.
    #[must_use]
    pub fn weight(&self) -> i64 {
        self.kind().map_or(0, UpsellType::weight)
    }

    /// Active means `status = active AND starts_at <= now AND expires_at > now`.
    ///
    /// The status column alone goes stale once the window passes, so this is
    /// the authoritative check.
    #[must_use]
    pub fn is_active(&self, now: DateTimeWithTimeZone) -> bool {
        self.status == UpsellStatus::Active
            && self.starts_at.is_some_and(|starts| starts <= now)
            && self.expires_at.is_some_and(|expires| expires > now)
    }

    /// Paid for and currently in effect.
    #[must_use]
    pub fn is_valid(&self, now: DateTimeWithTimeZone) -> bool {
        self.payment_status == PaymentStatus::Paid && self.is_active(now)
    }

    /// Active model writing back the lifecycle columns.
    #[must_use]
    pub fn into_lifecycle_update(self) -> ActiveModel {
        ActiveModel {
            id: Unchanged(self.id),
            starts_at: Set(self.starts_at),
            expires_at: Set(self.expires_at),
            status: Set(self.status),
            payment_status: Set(self.payment_status),
            payment_reference: Set(self.payment_reference),
            updated_at: Set(self.updated_at),
            ..Default::default()
        }
    }
}
