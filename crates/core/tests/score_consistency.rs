//! The database ranking and the in-memory scorer must agree.
//!
//! Requires a running `PostgreSQL` instance whose user may create databases.
//! Run with: `cargo test --test score_consistency -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use classifieds_core::services::ranking;
use classifieds_db::entities::{
    category,
    listing::{self, ApprovalStatus, ListingStatus, PostType, PromotionFlag},
    listing_upsell::{self, PaymentStatus, UpsellStatus},
    user,
};
use classifieds_db::repositories::{ListingFilter, ListingRepository, UpsellRepository};
use classifieds_db::test_utils::TestDatabase;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set, prelude::DateTimeWithTimeZone};

fn listing(id: &str, age_minutes: i64) -> listing::Model {
    listing::Model {
        id: id.to_string(),
        customer_id: "owner".to_string(),
        category_id: "cat".to_string(),
        title: format!("Listing {id}"),
        slug: format!("listing-{id}"),
        description: "Desk".to_string(),
        location: None,
        currency: "USD".to_string(),
        price_cents: None,
        status: ListingStatus::Active,
        approval_status: ApprovalStatus::Approved,
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
        created_at: (Utc::now() - Duration::minutes(age_minutes)).into(),
        updated_at: None,
    }
}

fn upsell(id: &str, listing_id: &str, kind: &str, status: UpsellStatus, expires_in: Duration) -> listing_upsell::Model {
    let now = Utc::now();
    listing_upsell::Model {
        id: id.to_string(),
        listing_id: listing_id.to_string(),
        upsell_type: kind.to_string(),
        price_cents: 1_000,
        currency: "USD".to_string(),
        duration_days: 7,
        starts_at: Some((now - Duration::days(1)).into()),
        expires_at: Some((now + expires_in).into()),
        status,
        payment_status: PaymentStatus::Paid,
        payment_reference: None,
        created_at: now.into(),
        updated_at: None,
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_sql_and_in_memory_scores_agree() {
    let db = TestDatabase::create_unique().await.expect("Failed to create");
    let conn = db.connection();

    user::ActiveModel {
        id: Set("owner".to_string()),
        username: Set("owner".to_string()),
        token: Set(None),
        name: Set(None),
        is_super_admin: Set(false),
        can_manage_listings: Set(false),
        permissions: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    }
    .insert(conn.as_ref())
    .await
    .unwrap();
    category::ActiveModel {
        id: Set("cat".to_string()),
        name: Set("Furniture".to_string()),
        slug: Set("furniture".to_string()),
        vertical: Set(category::Vertical::General),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    let in_a_week = Duration::days(7);
    let mut double = listing("double", 50);
    double.set_promotion(PromotionFlag::Sponsored, true, Some((Utc::now() + in_a_week).into()));
    let mut stale_flag = listing("stale-flag", 40);
    stale_flag.set_promotion(PromotionFlag::Featured, true, Some((Utc::now() - in_a_week).into()));
    let mut mixed = listing("mixed", 30);
    mixed.set_promotion(PromotionFlag::Promoted, true, Some((Utc::now() + in_a_week).into()));
    mixed.set_promotion(PromotionFlag::Store, true, Some((Utc::now() + in_a_week).into()));
    let plain = listing("plain", 1);

    let listings = vec![double, stale_flag, mixed, plain];
    for model in &listings {
        model.clone().into_active_model().insert(conn.as_ref()).await.unwrap();
    }

    let upsells = vec![
        upsell("u1", "double", "sponsored", UpsellStatus::Active, in_a_week),
        upsell("u2", "mixed", "premium", UpsellStatus::Active, in_a_week),
        upsell("u3", "mixed", "priority", UpsellStatus::Cancelled, in_a_week),
        upsell("u4", "stale-flag", "featured", UpsellStatus::Active, -Duration::hours(1)),
        upsell("u5", "plain", "spotlight", UpsellStatus::Active, in_a_week),
    ];
    for model in &upsells {
        model.clone().into_active_model().insert(conn.as_ref()).await.unwrap();
    }

    let listing_repo = ListingRepository::new(conn.clone());
    let upsell_repo = UpsellRepository::new(conn.clone());
    let now: DateTimeWithTimeZone = Utc::now().into();

    let ids: Vec<String> = listings.iter().map(|l| l.id.clone()).collect();
    let sql_scores = listing_repo.priority_scores(&ids, now).await.unwrap();
    let stored_upsells = upsell_repo.find_by_listings(&ids).await.unwrap();

    for model in &listings {
        let expected = ranking::priority_score(model, &stored_upsells, now);
        assert_eq!(sql_scores[&model.id], expected, "score of {}", model.id);
    }
    assert_eq!(sql_scores["double"], 1600);
    assert_eq!(sql_scores["mixed"], 1400);
    assert_eq!(sql_scores["stale-flag"], 0);
    assert_eq!(sql_scores["plain"], 0);

    let sql_order: Vec<String> = listing_repo
        .search(&ListingFilter::public(), now, 10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.id)
        .collect();
    let memory_order: Vec<String> = ranking::rank(listings, &stored_upsells, now)
        .into_iter()
        .map(|(l, _)| l.id)
        .collect();
    assert_eq!(sql_order, memory_order);

    db.drop_database().await.unwrap();
}
