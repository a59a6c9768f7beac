//! Priority scoring.
//!
//! A listing's score is the sum of the weights of its currently active
//! upsells plus the bonuses of its effective legacy promotion flags. A
//! legacy flag and an upsell of the same tier both count.
//!
//! The database computes the same number with
//! [`classifieds_db::repositories::priority_score_expr`]; both read their
//! weights from `UpsellType::weight` and `PromotionFlag::bonus`.

use std::cmp::Ordering;

use classifieds_db::entities::{
    listing::{self, PromotionFlag},
    listing_upsell,
};
use sea_orm::{Iterable, prelude::DateTimeWithTimeZone};
use serde::Serialize;

/// Where a score contribution came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreSource {
    Upsell {
        upsell_id: String,
        upsell_type: String,
    },
    LegacyFlag {
        flag: PromotionFlag,
    },
}

/// One term of the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreContribution {
    pub source: ScoreSource,
    pub points: i64,
}

/// A listing's score with its per-source breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityScore {
    pub listing_id: String,
    pub total: i64,
    pub contributions: Vec<ScoreContribution>,
}

/// Score a listing at `now`.
///
/// Upsells belonging to other listings are ignored.
#[must_use]
pub fn score(
    listing: &listing::Model,
    upsells: &[listing_upsell::Model],
    now: DateTimeWithTimeZone,
) -> PriorityScore {
    let upsell_terms = upsells
        .iter()
        .filter(|upsell| upsell.listing_id == listing.id && upsell.is_active(now))
        .map(|upsell| ScoreContribution {
            source: ScoreSource::Upsell {
                upsell_id: upsell.id.clone(),
                upsell_type: upsell.upsell_type.clone(),
            },
            points: upsell.weight(),
        });

    let flag_terms = PromotionFlag::iter()
        .filter(|flag| flag.bonus() > 0 && listing.is_promotion_active(*flag, now))
        .map(|flag| ScoreContribution {
            source: ScoreSource::LegacyFlag { flag },
            points: flag.bonus(),
        });

    let contributions: Vec<_> = upsell_terms.chain(flag_terms).collect();

    PriorityScore {
        listing_id: listing.id.clone(),
        total: contributions.iter().map(|c| c.points).sum(),
        contributions,
    }
}

/// Score total only.
#[must_use]
pub fn priority_score(
    listing: &listing::Model,
    upsells: &[listing_upsell::Model],
    now: DateTimeWithTimeZone,
) -> i64 {
    score(listing, upsells, now).total
}

/// Ranking order: higher score first, then newer first.
#[must_use]
pub fn compare(
    (a_score, a_created): (i64, DateTimeWithTimeZone),
    (b_score, b_created): (i64, DateTimeWithTimeZone),
) -> Ordering {
    b_score.cmp(&a_score).then_with(|| b_created.cmp(&a_created))
}

/// Sort listings into ranking order, pairing each with its score.
#[must_use]
pub fn rank(
    listings: Vec<listing::Model>,
    upsells: &[listing_upsell::Model],
    now: DateTimeWithTimeZone,
) -> Vec<(listing::Model, i64)> {
    let mut ranked: Vec<_> = listings
        .into_iter()
        .map(|listing| {
            let total = priority_score(&listing, upsells, now);
            (listing, total)
        })
        .collect();

    ranked.sort_by(|(a, a_score), (b, b_score)| {
        compare((*a_score, a.created_at), (*b_score, b.created_at))
    });
    ranked
}
