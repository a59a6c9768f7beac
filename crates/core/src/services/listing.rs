//! Listing service.
//!
//! Creation runs as explicit steps: validate, slug, persist, notify, then the
//! backlog check. Nothing happens implicitly on save.

use std::collections::HashMap;
use std::sync::LazyLock;

use classifieds_common::{AppError, AppResult, IdGenerator, config::ModerationConfig};
use classifieds_db::{
    entities::{
        category,
        listing::{self, ApprovalStatus, ListingStatus, PostType},
        notification::NotificationType,
    },
    repositories::{CategoryRepository, ListingFilter, ListingRepository, UpsellRepository},
};
use regex::Regex;
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::services::{
    auth::Capabilities,
    moderation::transition,
    notification::{AdminNotifierService, notify_best_effort},
    ranking::{self, PriorityScore},
};

#[allow(clippy::unwrap_used)]
static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

const SLUG_BASE_MAX: usize = 80;

/// URL slug for a listing: the title reduced to `[a-z0-9-]`, suffixed with
/// the tail of the listing ID so that equal titles never collide.
#[must_use]
pub fn slugify(title: &str, id: &str) -> String {
    let lowered = title.to_lowercase();
    let replaced = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let mut base: String = replaced.trim_matches('-').chars().take(SLUG_BASE_MAX).collect();
    while base.ends_with('-') {
        base.pop();
    }
    if base.is_empty() {
        base.push_str("listing");
    }

    let suffix_start = id.len().saturating_sub(8);
    let suffix = id.get(suffix_start..).unwrap_or(id);
    format!("{base}-{suffix}")
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, request: ResolvedPage) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            last_page: total.div_ceil(request.per_page).max(1),
        }
    }
}

/// Page selection as sent by clients.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Page selection after applying the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPage {
    pub page: u64,
    pub per_page: u64,
}

impl ResolvedPage {
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl PageRequest {
    #[must_use]
    pub fn resolve(self, config: &ModerationConfig) -> ResolvedPage {
        let per_page = config.page_size(self.per_page);
        // Postgres offsets are signed 64-bit
        let last_addressable = i64::MAX as u64 / per_page;
        ResolvedPage {
            page: self.page.unwrap_or(1).clamp(1, last_addressable),
            per_page,
        }
    }
}

/// Input for a customer listing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateListingInput {
    #[validate(length(min = 1, message = "The category field is required."))]
    pub category_id: String,
    #[validate(length(min = 3, max = 255, message = "The title must be between 3 and 255 characters."))]
    pub title: String,
    #[validate(length(min = 1, max = 10000, message = "The description must be between 1 and 10000 characters."))]
    pub description: String,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(equal = 3, message = "The currency must be a 3-letter code."))]
    pub currency: String,
    #[validate(range(min = 0, message = "The price may not be negative."))]
    pub price_cents: Option<i64>,
}

/// Input for a listing created by an administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAdminPostInput {
    #[serde(flatten)]
    #[validate(nested)]
    pub listing: CreateListingInput,
    /// Placement, `admin` when omitted
    pub post_type: Option<PostType>,
}

/// Partial update of a listing. `status` drives repost and deactivation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateListingInput {
    pub category_id: Option<String>,
    #[validate(length(min = 3, max = 255, message = "The title must be between 3 and 255 characters."))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000, message = "The description must be between 1 and 10000 characters."))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(equal = 3, message = "The currency must be a 3-letter code."))]
    pub currency: Option<String>,
    #[validate(range(min = 0, message = "The price may not be negative."))]
    pub price_cents: Option<i64>,
    pub status: Option<ListingStatus>,
}

/// Filters for the admin category view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryListingQuery {
    pub status: Option<ListingStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub post_type: Option<PostType>,
    pub search: Option<String>,
}

/// Approval counts of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub category_id: String,
    pub name: String,
    pub slug: String,
    pub vertical: category::Vertical,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

/// Whether the pending queue just crossed a multiple of `threshold`.
#[must_use]
pub const fn backlog_reached(pending: u64, threshold: u64) -> bool {
    threshold > 0 && pending >= threshold && pending % threshold == 0
}

fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

/// Listing service.
#[derive(Clone)]
pub struct ListingService {
    listing_repo: ListingRepository,
    category_repo: CategoryRepository,
    upsell_repo: UpsellRepository,
    notifier: AdminNotifierService,
    config: ModerationConfig,
    id_gen: IdGenerator,
}

impl ListingService {
    /// Create a new listing service.
    #[must_use]
    pub fn new(
        listing_repo: ListingRepository,
        category_repo: CategoryRepository,
        upsell_repo: UpsellRepository,
        notifier: AdminNotifierService,
        config: &ModerationConfig,
    ) -> Self {
        Self {
            listing_repo,
            category_repo,
            upsell_repo,
            notifier,
            config: config.clone(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Moderation tunables in effect.
    #[must_use]
    pub const fn config(&self) -> &ModerationConfig {
        &self.config
    }

    // ==================== Creation ====================

    /// Create a customer listing. It starts pending and administrators are
    /// told about it.
    pub async fn create(&self, customer_id: &str, input: CreateListingInput) -> AppResult<listing::Model> {
        input.validate()?;
        self.require_open_category(&input.category_id).await?;

        let model = self.new_listing(customer_id, input);
        let created = self.listing_repo.create(model).await?;
        tracing::info!(listing_id = %created.id, customer_id = %customer_id, "Listing created");

        self.notify_created(&created).await;
        self.check_backlog().await;

        Ok(created)
    }

    /// Create an auto-approved listing on behalf of an administrator.
    pub async fn create_admin_post(
        &self,
        admin: &Capabilities,
        input: CreateAdminPostInput,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;
        input.validate()?;
        self.require_open_category(&input.listing.category_id).await?;

        let post_type = input.post_type.unwrap_or(PostType::Admin);
        let now = now();
        let mut model = self.new_listing(&admin.user_id, input.listing);
        model.approval_status = Set(ApprovalStatus::Approved);
        model.approved_by = Set(Some(admin.user_id.clone()));
        model.approved_at = Set(Some(now));
        model.post_type = Set(post_type);
        model.is_admin_post = Set(true);

        let created = self.listing_repo.create(model).await?;
        tracing::info!(listing_id = %created.id, admin_id = %admin.user_id, post_type = ?post_type, "Admin post created");
        Ok(created)
    }

    fn new_listing(&self, owner_id: &str, input: CreateListingInput) -> listing::ActiveModel {
        let id = self.id_gen.generate();
        let slug = slugify(&input.title, &id);

        listing::ActiveModel {
            id: Set(id),
            customer_id: Set(owner_id.to_string()),
            category_id: Set(input.category_id),
            title: Set(input.title.trim().to_string()),
            slug: Set(slug),
            description: Set(input.description),
            location: Set(input.location),
            currency: Set(input.currency.to_uppercase()),
            price_cents: Set(input.price_cents),
            status: Set(ListingStatus::Active),
            approval_status: Set(ApprovalStatus::Pending),
            is_harmful: Set(false),
            moderation_notes: Set(None),
            approved_by: Set(None),
            approved_at: Set(None),
            rejection_reason: Set(None),
            post_type: Set(PostType::Regular),
            is_admin_post: Set(false),
            is_featured: Set(false),
            featured_expires_at: Set(None),
            is_suggested: Set(false),
            suggested_expires_at: Set(None),
            is_paid: Set(false),
            paid_expires_at: Set(None),
            is_promoted: Set(false),
            promoted_expires_at: Set(None),
            is_sponsored: Set(false),
            sponsored_expires_at: Set(None),
            is_business: Set(false),
            business_expires_at: Set(None),
            is_store: Set(false),
            store_expires_at: Set(None),
            last_reposted_at: Set(None),
            created_at: Set(now()),
            updated_at: Set(None),
        }
    }

    async fn require_open_category(&self, category_id: &str) -> AppResult<category::Model> {
        match self.category_repo.find_by_id(category_id).await? {
            Some(category) if category.is_active => Ok(category),
            Some(_) => Err(AppError::field(
                "category_id",
                "The selected category is not accepting listings.",
            )),
            None => Err(AppError::field("category_id", "The selected category is invalid.")),
        }
    }

    async fn notify_created(&self, listing: &listing::Model) {
        notify_best_effort(
            &self.notifier,
            NotificationType::ListingCreated,
            &format!("New listing \"{}\" is awaiting approval", listing.title),
            json!({
                "listing_id": listing.id,
                "category_id": listing.category_id,
                "customer_id": listing.customer_id,
            }),
        )
        .await;
    }

    async fn check_backlog(&self) {
        let threshold = self.config.pending_backlog_threshold;
        if threshold == 0 {
            return;
        }

        let pending = match self.listing_repo.count_pending(None).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count pending listings");
                return;
            }
        };

        if backlog_reached(pending, threshold) {
            notify_best_effort(
                &self.notifier,
                NotificationType::PendingBacklog,
                &format!("{pending} listings are awaiting approval"),
                json!({ "pending_count": pending, "threshold": threshold }),
            )
            .await;
        }
    }

    // ==================== Admin maintenance ====================

    /// Get a listing.
    pub async fn get(&self, id: &str) -> AppResult<listing::Model> {
        self.listing_repo.get_by_id(id).await
    }

    /// Edit a listing. Moving it back to `active` is a repost and sends it
    /// through approval again.
    pub async fn update(
        &self,
        admin: &Capabilities,
        id: &str,
        input: UpdateListingInput,
    ) -> AppResult<listing::Model> {
        admin.require_manage_listings()?;
        input.validate()?;
        if let Some(category_id) = &input.category_id {
            self.require_open_category(category_id).await?;
        }

        let mut listing = self.listing_repo.get_by_id(id).await?;
        let now = now();

        let reposted = match input.status {
            Some(ListingStatus::Active) if listing.status == ListingStatus::Inactive => {
                transition::reactivate(&mut listing, now)?;
                true
            }
            Some(ListingStatus::Inactive) if listing.status == ListingStatus::Active => {
                transition::deactivate(&mut listing, now)?;
                false
            }
            _ => false,
        };
        listing.updated_at = Some(now);

        let mut model = listing.into_state_update();
        if let Some(category_id) = input.category_id {
            model.category_id = Set(category_id);
        }
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(description) = input.description {
            model.description = Set(description);
        }
        if let Some(location) = input.location {
            model.location = Set(Some(location));
        }
        if let Some(currency) = input.currency {
            model.currency = Set(currency.to_uppercase());
        }
        if let Some(price_cents) = input.price_cents {
            model.price_cents = Set(Some(price_cents));
        }

        let saved = self.listing_repo.update(model).await?;
        tracing::info!(listing_id = %saved.id, admin_id = %admin.user_id, reposted, "Listing updated");
        Ok(saved)
    }

    /// Delete a listing and, through the foreign key, its upsells.
    pub async fn delete(&self, admin: &Capabilities, id: &str) -> AppResult<()> {
        admin.require_manage_listings()?;
        let listing = self.listing_repo.get_by_id(id).await?;
        self.listing_repo.delete(&listing.id).await?;
        tracing::info!(listing_id = %listing.id, admin_id = %admin.user_id, "Listing deleted");
        Ok(())
    }

    // ==================== Queries ====================

    /// Moderation queue, oldest first.
    pub async fn pending(
        &self,
        category_id: Option<&str>,
        page: PageRequest,
    ) -> AppResult<Page<listing::Model>> {
        let page = page.resolve(&self.config);
        let items = self
            .listing_repo
            .find_pending(category_id, page.per_page, page.offset())
            .await?;
        let total = self.listing_repo.count_pending(category_id).await?;
        Ok(Page::new(items, total, page))
    }

    /// Every listing of a category, highest priority first.
    pub async fn category_listings(
        &self,
        category_id: &str,
        query: CategoryListingQuery,
        page: PageRequest,
    ) -> AppResult<Page<listing::Model>> {
        self.category_repo.get_by_id(category_id).await?;

        let filter = ListingFilter {
            category_id: Some(category_id.to_string()),
            status: query.status,
            approval_status: query.approval_status,
            post_type: query.post_type,
            search: query.search,
            exclude_harmful: false,
        };
        self.ranked_page(&filter, page).await
    }

    /// What customers can browse: active, approved and not harmful, highest
    /// priority first.
    pub async fn search_public(
        &self,
        category_id: Option<String>,
        search: Option<String>,
        page: PageRequest,
    ) -> AppResult<Page<listing::Model>> {
        let filter = ListingFilter {
            category_id,
            search,
            ..ListingFilter::public()
        };
        self.ranked_page(&filter, page).await
    }

    async fn ranked_page(
        &self,
        filter: &ListingFilter,
        page: PageRequest,
    ) -> AppResult<Page<listing::Model>> {
        let page = page.resolve(&self.config);
        let items = self
            .listing_repo
            .search(filter, now(), page.per_page, page.offset())
            .await?;
        let total = self.listing_repo.count(filter).await?;
        Ok(Page::new(items, total, page))
    }

    /// Approval counts per category, including empty categories.
    pub async fn category_stats(&self, admin: &Capabilities) -> AppResult<Vec<CategoryStats>> {
        admin.require_view_category_stats()?;

        let categories = self.category_repo.list_all().await?;
        let mut counts: HashMap<String, CategoryStats> = categories
            .iter()
            .map(|category| {
                let stats = CategoryStats {
                    category_id: category.id.clone(),
                    name: category.name.clone(),
                    slug: category.slug.clone(),
                    vertical: category.vertical,
                    pending: 0,
                    approved: 0,
                    rejected: 0,
                    total: 0,
                };
                (category.id.clone(), stats)
            })
            .collect();

        for (category_id, approval, count) in self.listing_repo.approval_counts_by_category().await? {
            let Some(stats) = counts.get_mut(&category_id) else {
                continue;
            };
            match approval {
                ApprovalStatus::Pending => stats.pending += count,
                ApprovalStatus::Approved => stats.approved += count,
                ApprovalStatus::Rejected => stats.rejected += count,
            }
            stats.total += count;
        }

        Ok(categories
            .iter()
            .filter_map(|category| counts.remove(&category.id))
            .collect())
    }

    /// Current priority score of a listing with its breakdown.
    pub async fn score_breakdown(&self, id: &str) -> AppResult<PriorityScore> {
        let listing = self.listing_repo.get_by_id(id).await?;
        let upsells = self.upsell_repo.find_by_listing(id).await?;
        Ok(ranking::score(&listing, &upsells, now()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::auth::PermissionSet;
    use crate::services::notification::{AdminNotifier, NoOpAdminNotifier};
    use crate::services::ranking::tests::{active_upsell, create_test_listing};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use classifieds_db::entities::listing::PromotionFlag;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<NotificationType>>,
    }

    #[async_trait]
    impl AdminNotifier for RecordingNotifier {
        async fn notify_all_admins(
            &self,
            event_type: NotificationType,
            _message: &str,
            _context: serde_json::Value,
        ) -> AppResult<usize> {
            self.events.lock().unwrap().push(event_type);
            Ok(1)
        }
    }

    fn admin() -> Capabilities {
        Capabilities {
            user_id: "admin1".to_string(),
            manage_listings: true,
            super_admin: false,
            permissions: PermissionSet::default(),
        }
    }

    fn open_category(id: &str) -> category::Model {
        category::Model {
            id: id.to_string(),
            name: "Furniture".to_string(),
            slug: "furniture".to_string(),
            vertical: category::Vertical::General,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    fn count_row(count: i64) -> BTreeMap<String, Value> {
        BTreeMap::from([("num_items".to_string(), Value::from(count))])
    }

    fn input() -> CreateListingInput {
        CreateListingInput {
            category_id: "cat1".to_string(),
            title: "Vintage desk".to_string(),
            description: "Oak, 1960s".to_string(),
            location: None,
            currency: "usd".to_string(),
            price_cents: Some(25_000),
        }
    }

    fn service(db: MockDatabase, notifier: AdminNotifierService) -> ListingService {
        let db = Arc::new(db.into_connection());
        ListingService::new(
            ListingRepository::new(db.clone()),
            CategoryRepository::new(db.clone()),
            UpsellRepository::new(db),
            notifier,
            &ModerationConfig::default(),
        )
    }

    #[test]
    fn test_slugify() {
        let id = "01hx5k3v9q2w7e8r4t6y1u0i9o";
        assert_eq!(slugify("Vintage Desk!! (Oak)", id), "vintage-desk-oak-6y1u0i9o");
        assert_eq!(slugify("  ¡¡!! ", id), "listing-6y1u0i9o");
        assert_eq!(slugify("Café", "ab"), "caf-ab");
    }

    #[test]
    fn test_slug_base_is_bounded() {
        let slug = slugify(&"a".repeat(300), "id");
        assert_eq!(slug.len(), SLUG_BASE_MAX + 3);
    }

    #[test]
    fn test_backlog_fires_on_threshold_multiples() {
        assert!(!backlog_reached(49, 50));
        assert!(backlog_reached(50, 50));
        assert!(!backlog_reached(51, 50));
        assert!(backlog_reached(100, 50));
        assert!(!backlog_reached(100, 0));
    }

    #[test]
    fn test_page_request_resolution() {
        let config = ModerationConfig::default();

        let page = PageRequest { page: Some(0), per_page: Some(500) }.resolve(&config);
        assert_eq!(page, ResolvedPage { page: 1, per_page: 100 });
        assert_eq!(page.offset(), 0);

        let page = PageRequest { page: Some(3), per_page: None }.resolve(&config);
        assert_eq!(page.offset(), 40);

        let result: Page<u8> = Page::new(vec![], 41, page);
        assert_eq!(result.last_page, 3);
    }

    #[test]
    fn test_huge_page_stays_within_offset_range() {
        let config = ModerationConfig::default();

        let page = PageRequest { page: Some(u64::MAX), per_page: Some(20) }.resolve(&config);
        assert_eq!(page.page, i64::MAX as u64 / 20);
        assert!(page.offset() <= i64::MAX as u64);

        let page = PageRequest { page: Some(u64::MAX), per_page: Some(1) }.resolve(&config);
        assert_eq!(page.offset(), i64::MAX as u64 - 1);
    }

    #[tokio::test]
    async fn test_create_notifies_admins() {
        let created = create_test_listing("l1");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_category("cat1")]])
            .append_query_results([[created]])
            .append_query_results([[count_row(3)]]);
        let notifier = Arc::new(RecordingNotifier::default());

        let listing = service(db, notifier.clone())
            .create("customer1", input())
            .await
            .unwrap();

        assert_eq!(listing.approval_status, ApprovalStatus::Pending);
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec![NotificationType::ListingCreated]
        );
    }

    #[tokio::test]
    async fn test_create_at_backlog_threshold_sends_backlog_alert() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_category("cat1")]])
            .append_query_results([[create_test_listing("l1")]])
            .append_query_results([[count_row(50)]]);
        let notifier = Arc::new(RecordingNotifier::default());

        service(db, notifier.clone())
            .create("customer1", input())
            .await
            .unwrap();

        assert_eq!(
            *notifier.events.lock().unwrap(),
            vec![NotificationType::ListingCreated, NotificationType::PendingBacklog]
        );
    }

    #[tokio::test]
    async fn test_create_in_closed_category_is_rejected() {
        let mut closed = open_category("cat1");
        closed.is_active = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[closed]]);

        let result = service(db, Arc::new(NoOpAdminNotifier))
            .create("customer1", input())
            .await;

        match result {
            Err(AppError::Validation { errors, .. }) => {
                assert!(errors.unwrap().contains_key("category_id"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let mut bad = input();
        bad.title = "x".to_string();
        bad.price_cents = Some(-5);

        let result = service(db, Arc::new(NoOpAdminNotifier))
            .create("customer1", bad)
            .await;

        match result {
            Err(AppError::Validation { errors, .. }) => {
                let errors = errors.unwrap();
                assert!(errors.contains_key("title"));
                assert!(errors.contains_key("price_cents"));
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admin_post_is_approved_without_notification() {
        let mut created = create_test_listing("l1");
        created.approval_status = ApprovalStatus::Approved;
        created.approved_by = Some("admin1".to_string());
        created.post_type = PostType::Admin;
        created.is_admin_post = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_category("cat1")]])
            .append_query_results([[created]]);
        let notifier = Arc::new(RecordingNotifier::default());

        let listing = service(db, notifier.clone())
            .create_admin_post(
                &admin(),
                CreateAdminPostInput {
                    listing: input(),
                    post_type: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(listing.approval_status, ApprovalStatus::Approved);
        assert_eq!(listing.approved_by.as_deref(), Some("admin1"));
        assert!(listing.is_admin_post);
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_reactivation_resets_approval() {
        let mut inactive = create_test_listing("l1");
        inactive.status = ListingStatus::Inactive;
        inactive.approval_status = ApprovalStatus::Approved;
        inactive.approved_by = Some("admin1".to_string());

        let mut reposted = inactive.clone();
        transition::reactivate(&mut reposted, now()).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[inactive]])
            .append_query_results([[reposted]]);

        let input = UpdateListingInput {
            status: Some(ListingStatus::Active),
            ..UpdateListingInput::default()
        };
        let saved = service(db, Arc::new(NoOpAdminNotifier))
            .update(&admin(), "l1", input)
            .await
            .unwrap();

        assert_eq!(saved.status, ListingStatus::Active);
        assert_eq!(saved.approval_status, ApprovalStatus::Pending);
        assert!(saved.approved_by.is_none());
        assert!(saved.last_reposted_at.is_some());
    }

    #[tokio::test]
    async fn test_update_cannot_reactivate_harmful_listing() {
        let mut harmful = create_test_listing("l1");
        transition::mark_harmful(&mut harmful, "scam", now());
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[harmful]]);

        let input = UpdateListingInput {
            status: Some(ListingStatus::Active),
            ..UpdateListingInput::default()
        };
        let result = service(db, Arc::new(NoOpAdminNotifier))
            .update(&admin(), "l1", input)
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_category_stats() {
        let mut second = open_category("cat2");
        second.name = "Jobs".to_string();
        // Tuple rows are read by position, and mock rows iterate by key
        let row = |category: &str, approval: &str, count: i64| {
            BTreeMap::from([
                ("a_category_id".to_string(), Value::from(category.to_string())),
                ("b_approval_status".to_string(), Value::from(approval.to_string())),
                ("c_listing_count".to_string(), Value::from(count)),
            ])
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_category("cat1"), second]])
            .append_query_results([vec![
                row("cat1", "pending", 4),
                row("cat1", "approved", 10),
                row("cat1", "rejected", 1),
                row("gone", "approved", 7),
            ]]);

        let stats = service(db, Arc::new(NoOpAdminNotifier))
            .category_stats(&admin())
            .await
            .unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].category_id, "cat1");
        assert_eq!((stats[0].pending, stats[0].approved, stats[0].rejected), (4, 10, 1));
        assert_eq!(stats[0].total, 15);
        assert_eq!(stats[1].total, 0);
    }

    #[tokio::test]
    async fn test_score_breakdown_includes_both_sources() {
        let mut listing = create_test_listing("l1");
        listing.set_promotion(
            PromotionFlag::Promoted,
            true,
            Some((Utc::now() + Duration::days(3)).into()),
        );

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[listing]])
            .append_query_results([[active_upsell("u1", "l1", "sponsored")]]);

        let score = service(db, Arc::new(NoOpAdminNotifier))
            .score_breakdown("l1")
            .await
            .unwrap();

        assert_eq!(score.total, 1200);
        assert_eq!(score.contributions.len(), 2);
    }

    #[tokio::test]
    async fn test_pending_page() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_listing("l1"), create_test_listing("l2")]])
            .append_query_results([[count_row(2)]]);

        let page = service(db, Arc::new(NoOpAdminNotifier))
            .pending(Some("cat1"), PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 2);
        assert_eq!(page.per_page, 20);
    }
}
