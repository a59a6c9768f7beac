//! Listing repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{
    Listing, ListingUpsell,
    listing::{self, ApprovalStatus, ListingStatus, PostType, PromotionFlag},
    listing_upsell::{self, UpsellStatus, UpsellType},
};
use classifieds_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Iterable, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
    prelude::DateTimeWithTimeZone,
    sea_query::{Alias, CaseStatement, Expr, Func, Query, SimpleExpr, SubQueryStatement},
};

/// Filters shared by the ranked listing queries.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub category_id: Option<String>,
    pub status: Option<ListingStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub post_type: Option<PostType>,
    /// Case-insensitive match on title or description
    pub search: Option<String>,
    pub exclude_harmful: bool,
}

impl ListingFilter {
    /// What customers may see: active, approved and not harmful.
    #[must_use]
    pub fn public() -> Self {
        Self {
            status: Some(ListingStatus::Active),
            approval_status: Some(ApprovalStatus::Approved),
            exclude_harmful: true,
            ..Self::default()
        }
    }

    fn apply(&self, mut query: Select<Listing>) -> Select<Listing> {
        if let Some(category_id) = &self.category_id {
            query = query.filter(listing::Column::CategoryId.eq(category_id.as_str()));
        }
        if let Some(status) = self.status {
            query = query.filter(listing::Column::Status.eq(status));
        }
        if let Some(approval_status) = self.approval_status {
            query = query.filter(listing::Column::ApprovalStatus.eq(approval_status));
        }
        if let Some(post_type) = self.post_type {
            query = query.filter(listing::Column::PostType.eq(post_type));
        }
        if self.exclude_harmful {
            query = query.filter(listing::Column::IsHarmful.eq(false));
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!(
                "%{}%",
                term.to_lowercase().replace('%', "\\%").replace('_', "\\_")
            );
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(listing::Column::Title))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(listing::Column::Description)))
                            .like(&pattern),
                    ),
            );
        }
        query
    }
}

/// Sum of the weights of the listing's currently active upsells, as a
/// correlated subquery against the outer `listing` row. NULL when none.
fn active_upsell_weight(now: DateTimeWithTimeZone) -> SimpleExpr {
    let weight = UpsellType::iter()
        .fold(CaseStatement::new(), |case, kind| {
            case.case(
                Expr::col((ListingUpsell, listing_upsell::Column::UpsellType)).eq(kind.as_str()),
                Expr::val(kind.weight()),
            )
        })
        .finally(Expr::val(0i64));

    let select = Query::select()
        .expr(Func::sum(SimpleExpr::Case(Box::new(weight))))
        .from(ListingUpsell)
        .and_where(
            Expr::col((ListingUpsell, listing_upsell::Column::ListingId))
                .equals((Listing, listing::Column::Id)),
        )
        .and_where(
            Expr::col((ListingUpsell, listing_upsell::Column::Status)).eq(UpsellStatus::Active),
        )
        .and_where(Expr::col((ListingUpsell, listing_upsell::Column::StartsAt)).lte(now))
        .and_where(Expr::col((ListingUpsell, listing_upsell::Column::ExpiresAt)).gt(now))
        .to_owned();

    SimpleExpr::SubQuery(None, Box::new(SubQueryStatement::SelectStatement(select)))
}

/// Query-time priority score of a `listing` row at `now`.
///
/// Weights are read from [`UpsellType::weight`] and [`PromotionFlag::bonus`],
/// the same tables the in-memory scorer uses.
#[must_use]
pub fn priority_score_expr(now: DateTimeWithTimeZone) -> SimpleExpr {
    let mut score: SimpleExpr =
        Func::coalesce([active_upsell_weight(now), Expr::val(0i64).into()]).into();

    for flag in PromotionFlag::iter().filter(|flag| flag.bonus() > 0) {
        let (is_set, expires_at) = flag.columns();
        let bonus = Expr::case(
            Expr::col((Listing, is_set))
                .eq(true)
                .and(Expr::col((Listing, expires_at)).gt(now)),
            Expr::val(flag.bonus()),
        )
        .finally(Expr::val(0i64));
        score = score.add(bonus);
    }

    // SUM over bigint yields numeric in Postgres
    score.cast_as(Alias::new("bigint"))
}

/// Listing repository for database operations.
#[derive(Clone)]
pub struct ListingRepository {
    db: Arc<DatabaseConnection>,
}

impl ListingRepository {
    /// Create a new listing repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a listing by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<listing::Model>> {
        Listing::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a listing by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<listing::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ListingNotFound(id.to_string()))
    }

    /// Find listings by IDs. Unknown IDs are simply absent from the result.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<listing::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Listing::find()
            .filter(listing::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new listing.
    pub async fn create(&self, model: listing::ActiveModel) -> AppResult<listing::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a listing.
    pub async fn update(&self, model: listing::ActiveModel) -> AppResult<listing::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write back the moderation state of a listing.
    pub async fn save_state(&self, model: listing::Model) -> AppResult<listing::Model> {
        self.update(model.into_state_update()).await
    }

    /// Write back the moderation state of several listings in one
    /// transaction. Any failure rolls back the whole batch.
    pub async fn save_states(&self, models: Vec<listing::Model>) -> AppResult<Vec<listing::Model>> {
        if models.is_empty() {
            return Ok(vec![]);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut saved = Vec::with_capacity(models.len());
        for model in models {
            // Dropping `txn` on the error path rolls it back
            let updated = model
                .into_state_update()
                .update(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            saved.push(updated);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(saved)
    }

    /// Delete a listing.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Listing::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete several listings in one statement, returning how many rows went.
    pub async fn delete_many(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Listing::delete_many()
            .filter(listing::Column::Id.is_in(ids.to_vec()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    // ==================== Moderation queue ====================

    fn pending_query(category_id: Option<&str>) -> Select<Listing> {
        let mut query = Listing::find()
            .filter(listing::Column::ApprovalStatus.eq(ApprovalStatus::Pending));
        if let Some(category_id) = category_id {
            query = query.filter(listing::Column::CategoryId.eq(category_id));
        }
        query
    }

    /// Pending listings, oldest first.
    pub async fn find_pending(
        &self,
        category_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<listing::Model>> {
        Self::pending_query(category_id)
            .order_by_asc(listing::Column::CreatedAt)
            .order_by_asc(listing::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of pending listings.
    pub async fn count_pending(&self, category_id: Option<&str>) -> AppResult<u64> {
        Self::pending_query(category_id)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Ranked queries ====================

    /// Select matching `filter`, ordered by priority score then recency.
    #[must_use]
    pub fn ranked_query(filter: &ListingFilter, now: DateTimeWithTimeZone) -> Select<Listing> {
        filter
            .apply(Listing::find())
            .order_by(priority_score_expr(now), Order::Desc)
            .order_by_desc(listing::Column::CreatedAt)
    }

    /// A page of listings matching `filter`, highest priority first.
    pub async fn search(
        &self,
        filter: &ListingFilter,
        now: DateTimeWithTimeZone,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<listing::Model>> {
        Self::ranked_query(filter, now)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of listings matching `filter`.
    pub async fn count(&self, filter: &ListingFilter) -> AppResult<u64> {
        filter
            .apply(Listing::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Priority scores of the given listings computed by the database.
    pub async fn priority_scores(
        &self,
        ids: &[String],
        now: DateTimeWithTimeZone,
    ) -> AppResult<HashMap<String, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Listing::find()
            .select_only()
            .column(listing::Column::Id)
            .expr_as(priority_score_expr(now), "priority_score")
            .filter(listing::Column::Id.is_in(ids.to_vec()))
            .into_tuple::<(String, i64)>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().collect())
    }

    /// Listing counts grouped by category and approval status.
    pub async fn approval_counts_by_category(
        &self,
    ) -> AppResult<Vec<(String, ApprovalStatus, i64)>> {
        Listing::find()
            .select_only()
            .column(listing::Column::CategoryId)
            .column(listing::Column::ApprovalStatus)
            .expr_as(Expr::col(listing::Column::Id).count(), "listing_count")
            .group_by(listing::Column::CategoryId)
            .group_by(listing::Column::ApprovalStatus)
            .into_tuple::<(String, ApprovalStatus, i64)>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait, Value};
    use std::collections::BTreeMap;

    fn create_test_listing(id: &str, approval: ApprovalStatus) -> listing::Model {
        let now = Utc::now();
        listing::Model {
            id: id.to_string(),
            customer_id: "customer1".to_string(),
            category_id: "cat1".to_string(),
            title: format!("Listing {id}"),
            slug: format!("listing-{id}"),
            description: "A bicycle in good condition".to_string(),
            location: Some("Lisbon".to_string()),
            currency: "EUR".to_string(),
            price_cents: Some(12_000),
            status: ListingStatus::Active,
            approval_status: approval,
            is_harmful: false,
            moderation_notes: None,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            post_type: PostType::Regular,
            is_admin_post: false,
            is_featured: false,
            featured_expires_at: None,
            is_suggested: false,
            suggested_expires_at: None,
            is_paid: false,
            paid_expires_at: None,
            is_promoted: false,
            promoted_expires_at: None,
            is_sponsored: false,
            sponsored_expires_at: None,
            is_business: false,
            business_expires_at: None,
            is_store: false,
            store_expires_at: None,
            last_reposted_at: None,
            created_at: (now - Duration::hours(1)).into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<listing::Model>::new()])
                .into_connection(),
        );

        let repo = ListingRepository::new(db);
        match repo.get_by_id("nonexistent").await {
            Err(AppError::ListingNotFound(id)) => assert_eq!(id, "nonexistent"),
            other => panic!("Expected ListingNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = ListingRepository::new(db);
        let result = repo.find_by_ids(&[]).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_save_states_commits_batch() {
        let mut first = create_test_listing("l1", ApprovalStatus::Pending);
        first.approval_status = ApprovalStatus::Approved;
        let mut second = create_test_listing("l2", ApprovalStatus::Pending);
        second.approval_status = ApprovalStatus::Approved;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[first.clone()]])
                .append_query_results([[second.clone()]])
                .into_connection(),
        );

        let repo = ListingRepository::new(db.clone());
        let saved = repo.save_states(vec![first, second]).await.unwrap();
        drop(repo);

        assert_eq!(saved.len(), 2);
        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        assert_eq!(log.len(), 1, "both updates run in a single transaction");
    }

    #[tokio::test]
    async fn test_delete_many_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = ListingRepository::new(db);
        let deleted = repo
            .delete_many(&["l1".to_string(), "l2".to_string()])
            .await
            .unwrap();

        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn test_find_pending() {
        let older = create_test_listing("l1", ApprovalStatus::Pending);
        let newer = create_test_listing("l2", ApprovalStatus::Pending);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[older, newer]])
                .into_connection(),
        );

        let repo = ListingRepository::new(db);
        let result = repo.find_pending(Some("cat1"), 20, 0).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "l1");
    }

    #[tokio::test]
    async fn test_priority_scores() {
        let row = |id: &str, score: i64| {
            BTreeMap::from([
                ("id".to_string(), Value::from(id.to_string())),
                ("priority_score".to_string(), Value::from(score)),
            ])
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![row("l1", 1200), row("l2", 0)]])
                .into_connection(),
        );

        let repo = ListingRepository::new(db);
        let scores = repo
            .priority_scores(&["l1".to_string(), "l2".to_string()], Utc::now().into())
            .await
            .unwrap();

        assert_eq!(scores["l1"], 1200);
        assert_eq!(scores["l2"], 0);
    }

    #[test]
    fn test_ranked_query_orders_by_score_then_recency() {
        let sql = ListingRepository::ranked_query(&ListingFilter::public(), Utc::now().into())
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"FROM "listing_upsell""#));
        assert!(sql.contains(r#""listing_upsell"."listing_id" = "listing"."id""#));
        assert!(sql.contains(r#""is_harmful" = FALSE"#));
        assert!(sql.contains(r#"DESC, "listing"."created_at" DESC"#));
    }

    #[test]
    fn test_score_expression_covers_weighted_flags_only() {
        let sql = Listing::find()
            .select_only()
            .expr_as(priority_score_expr(Utc::now().into()), "priority_score")
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains("SUM(CASE WHEN"));
        for kind in UpsellType::iter() {
            assert!(sql.contains(&format!("'{}'", kind.as_str())));
        }
        assert!(sql.contains(r#""listing"."is_sponsored""#));
        assert!(sql.contains(r#""listing"."is_featured""#));
        assert!(sql.contains(r#""listing"."is_promoted""#));
        assert!(!sql.contains(r#""listing"."is_store""#));
    }

    #[test]
    fn test_search_filter_is_case_insensitive_and_escaped() {
        let filter = ListingFilter {
            search: Some("  50% Off_Bike ".to_string()),
            ..ListingFilter::default()
        };
        let sql = filter
            .apply(Listing::find())
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains("LOWER"));
        assert!(sql.contains("off"));
        assert!(!sql.contains("Off"));
    }
}
