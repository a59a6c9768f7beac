//! Admin notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "listing_created")]
    ListingCreated,
    #[sea_orm(string_value = "pending_backlog")]
    PendingBacklog,
    #[sea_orm(string_value = "harmful_content")]
    HarmfulContent,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The administrator receiving the notification
    pub notifiee_id: String,

    pub notification_type: NotificationType,

    /// Listing the event is about, if any
    #[sea_orm(nullable)]
    pub listing_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    /// Event-specific data
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub context: Option<Json>,

    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::NotifieeId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Notifiee,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifiee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
