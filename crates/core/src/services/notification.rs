//! Administrator notifications.
//!
//! Listing and moderation services only see the [`AdminNotifier`] trait.
//! Callers treat delivery as fire-and-forget: a failed fan-out is logged and
//! never fails the operation that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use classifieds_common::{AppError, AppResult, IdGenerator};
use classifieds_db::{
    entities::notification::{self, NotificationType},
    repositories::{NotificationRepository, UserRepository},
};
use sea_orm::Set;
use serde_json::Value;

use crate::services::auth::Capabilities;

/// Fan-out of an event to every administrator.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    /// Notify all administrators, returning how many were notified.
    ///
    /// A string `listing_id` in `context` is stored as the related listing.
    async fn notify_all_admins(
        &self,
        event_type: NotificationType,
        message: &str,
        context: Value,
    ) -> AppResult<usize>;
}

/// Shared handle to a notifier.
pub type AdminNotifierService = Arc<dyn AdminNotifier>;

/// A notifier that drops every event.
#[derive(Clone, Default)]
pub struct NoOpAdminNotifier;

#[async_trait]
impl AdminNotifier for NoOpAdminNotifier {
    async fn notify_all_admins(
        &self,
        _event_type: NotificationType,
        _message: &str,
        _context: Value,
    ) -> AppResult<usize> {
        Ok(0)
    }
}

/// Run a fan-out, logging instead of propagating failures.
pub(crate) async fn notify_best_effort(
    notifier: &AdminNotifierService,
    event_type: NotificationType,
    message: &str,
    context: Value,
) {
    match notifier.notify_all_admins(event_type, message, context).await {
        Ok(count) => {
            tracing::debug!(event = ?event_type, recipients = count, "Notified administrators");
        }
        Err(e) => {
            tracing::warn!(error = %e, event = ?event_type, "Failed to notify administrators");
        }
    }
}

/// Notification service: admin fan-out and the admin inbox.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository, user_repo: UserRepository) -> Self {
        Self {
            notification_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Notifications of a user, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, unread_only, limit, offset)
            .await
    }

    /// Number of unread notifications of a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_as_read(&self, user_id: &str, id: &str) -> AppResult<notification::Model> {
        let existing = self
            .notification_repo
            .find_by_id(id)
            .await?
            .filter(|n| n.notifiee_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Notification: {id}")))?;

        if existing.is_read {
            return Ok(existing);
        }

        self.notification_repo.mark_as_read(id).await
    }
}

#[async_trait]
impl AdminNotifier for NotificationService {
    async fn notify_all_admins(
        &self,
        event_type: NotificationType,
        message: &str,
        context: Value,
    ) -> AppResult<usize> {
        let admins = self.user_repo.find_admins().await?;

        let recipients: Vec<String> = admins
            .iter()
            .filter_map(|admin| match Capabilities::from_user(admin) {
                Ok(caps) if caps.receives_admin_notifications() => Some(caps.user_id),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %admin.id, "Skipping administrator with unreadable permissions");
                    None
                }
            })
            .collect();

        if recipients.is_empty() {
            return Ok(0);
        }

        let listing_id = context
            .get("listing_id")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let now = chrono::Utc::now();

        let rows: Vec<_> = recipients
            .iter()
            .map(|notifiee_id| notification::ActiveModel {
                id: Set(self.id_gen.generate()),
                notifiee_id: Set(notifiee_id.clone()),
                notification_type: Set(event_type),
                listing_id: Set(listing_id.clone()),
                message: Set(message.to_string()),
                context: Set(Some(context.clone())),
                is_read: Set(false),
                created_at: Set(now.into()),
            })
            .collect();

        self.notification_repo.create_many(rows).await?;

        tracing::info!(event = ?event_type, recipients = recipients.len(), "Created administrator notifications");
        Ok(recipients.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use classifieds_db::entities::user;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn admin(id: &str, can_manage: bool, super_admin: bool, permissions: Option<Value>) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            token: None,
            name: None,
            is_super_admin: super_admin,
            can_manage_listings: can_manage,
            permissions,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_notification(id: &str, notifiee_id: &str, is_read: bool) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            notifiee_id: notifiee_id.to_string(),
            notification_type: NotificationType::ListingCreated,
            listing_id: Some("listing1".to_string()),
            message: "New listing".to_string(),
            context: None,
            is_read,
            created_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase) -> NotificationService {
        let db = Arc::new(db.into_connection());
        NotificationService::new(
            NotificationRepository::new(db.clone()),
            UserRepository::new(db),
        )
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_administrator() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                admin("mod1", true, false, None),
                admin("root", false, true, None),
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }]);

        let count = service(db)
            .notify_all_admins(
                NotificationType::ListingCreated,
                "New listing awaiting review",
                json!({ "listing_id": "listing1" }),
            )
            .await
            .unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_fan_out_skips_opted_out_and_broken_permissions() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                admin("mod1", true, false, Some(json!({ "version": 1, "notifications": false }))),
                admin("mod2", true, false, Some(json!({ "version": 9 }))),
                admin("mod3", true, false, None),
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);

        let count = service(db)
            .notify_all_admins(NotificationType::HarmfulContent, "Spam", json!({}))
            .await
            .unwrap();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_admins_granted_by_permission_set() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                admin("granted", false, false, Some(json!({ "version": 1, "listings": true }))),
                admin("customer", false, false, Some(json!({ "version": 1 }))),
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service(db);

        let count = service
            .notify_all_admins(
                NotificationType::ListingCreated,
                "New listing awaiting review",
                json!({ "listing_id": "listing1" }),
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_fan_out_without_admins_writes_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);

        let count = service(db)
            .notify_all_admins(NotificationType::PendingBacklog, "Backlog", json!({}))
            .await
            .unwrap();

        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_mark_as_read_rejects_foreign_notification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_notification("n1", "someone_else", false)]]);

        let result = service(db).mark_as_read("admin1", "n1").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_as_read_already_read_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_notification("n1", "admin1", true)]]);

        let read = service(db).mark_as_read("admin1", "n1").await.unwrap();

        assert!(read.is_read);
    }
}
