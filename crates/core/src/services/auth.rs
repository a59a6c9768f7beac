//! Authorization context.
//!
//! A user's rights are resolved once per request into [`Capabilities`];
//! business logic only ever asks the capability object, never the raw user.

use classifieds_common::{AppError, AppResult};
use classifieds_db::entities::user;
use serde::{Deserialize, Serialize};

/// Schema version of the stored permission document.
pub const PERMISSION_SET_VERSION: u32 = 1;

/// Typed view of the `user.permissions` JSON column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionSet {
    pub version: u32,
    /// Grants listing moderation on top of the `can_manage_listings` column
    #[serde(default)]
    pub listings: bool,
    /// Grants read access to category statistics
    #[serde(default)]
    pub categories: bool,
    /// Whether the user wants administrator notifications
    #[serde(default = "default_notifications")]
    pub notifications: bool,
}

const fn default_notifications() -> bool {
    true
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self {
            version: PERMISSION_SET_VERSION,
            listings: false,
            categories: false,
            notifications: true,
        }
    }
}

impl PermissionSet {
    /// Parse the stored document. A missing document yields the defaults.
    pub fn parse(raw: Option<&serde_json::Value>) -> AppResult<Self> {
        let Some(raw) = raw else {
            return Ok(Self::default());
        };

        let set: Self = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::Config(format!("Invalid permission set: {e}")))?;

        if set.version != PERMISSION_SET_VERSION {
            return Err(AppError::Config(format!(
                "Unsupported permission set version {} (expected {PERMISSION_SET_VERSION})",
                set.version
            )));
        }

        Ok(set)
    }
}

/// What the authenticated user may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub user_id: String,
    pub manage_listings: bool,
    pub super_admin: bool,
    pub permissions: PermissionSet,
}

impl Capabilities {
    /// Resolve the capabilities of a user.
    pub fn from_user(user: &user::Model) -> AppResult<Self> {
        let permissions = PermissionSet::parse(user.permissions.as_ref())?;

        Ok(Self {
            user_id: user.id.clone(),
            manage_listings: user.can_manage_listings || user.is_super_admin || permissions.listings,
            super_admin: user.is_super_admin,
            permissions,
        })
    }

    /// Administrators are listing managers and super-admins.
    #[must_use]
    pub const fn is_administrator(&self) -> bool {
        self.manage_listings || self.super_admin
    }

    /// Whether admin fan-out notifications reach this user.
    #[must_use]
    pub const fn receives_admin_notifications(&self) -> bool {
        self.is_administrator() && self.permissions.notifications
    }

    /// Fail with 403 unless the user may moderate listings.
    pub fn require_manage_listings(&self) -> AppResult<()> {
        if self.manage_listings {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to manage listings".to_string(),
            ))
        }
    }

    /// Fail with 403 unless the user is a super-admin.
    pub fn require_super_admin(&self) -> AppResult<()> {
        if self.super_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "This action requires super-admin privileges".to_string(),
            ))
        }
    }

    /// Fail with 403 unless the user may read category statistics.
    pub fn require_view_category_stats(&self) -> AppResult<()> {
        if self.manage_listings || self.permissions.categories {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to view category statistics".to_string(),
            ))
        }
    }
}
