//! Scoring & ranking.
//!
//! engagement = likes + 2*recasts + 1.5*replies
//!
//! `EngagementOnly` ranks by engagement alone (global "today" list).
//! `RecencyWeighted` multiplies it by `1 + 0.5 * bonus`, where the bonus
//! decays linearly from 1 (just published) to 0 (24h old and beyond).

use super::types::{Cast, Engagement, RankedResult};

pub const TODAY_TOP_N: usize = 20;
pub const AUTHOR_TOP_N: usize = 10;

const MS_PER_HOUR: f64 = 3_600_000.0;
const RECENCY_WINDOW_HOURS: f64 = 24.0;
const RECENCY_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoringPolicy {
    EngagementOnly,
    RecencyWeighted { now_ms: i64 },
}

pub fn engagement_score(e: &Engagement) -> f64 {
    e.likes as f64 + 2.0 * e.recasts as f64 + 1.5 * e.replies as f64
}

/// Linear decay in [0, 1]; posts stamped in the future count as brand new.
pub fn recency_bonus(published_at: i64, now_ms: i64) -> f64 {
    let age_hours = (now_ms.saturating_sub(published_at) as f64 / MS_PER_HOUR).max(0.0);
    (RECENCY_WINDOW_HOURS - age_hours).max(0.0) / RECENCY_WINDOW_HOURS
}

impl ScoringPolicy {
    pub fn score(&self, cast: &Cast) -> f64 {
        let base = engagement_score(&cast.engagement);
        match *self {
            ScoringPolicy::EngagementOnly => base,
            ScoringPolicy::RecencyWeighted { now_ms } => {
                base * (1.0 + recency_bonus(cast.published_at, now_ms) * RECENCY_WEIGHT)
            }
        }
    }
}

/// Score every cast, sort descending (stable: ties keep encounter order) and
/// keep the first `top_n`. `total` is the count before truncation.
pub fn rank(casts: Vec<Cast>, policy: ScoringPolicy, top_n: usize) -> RankedResult {
    let total = casts.len();
    let mut scored: Vec<Cast> = casts
        .into_iter()
        .map(|mut c| {
            c.score = Some(policy.score(&c));
            c
        })
        .collect();

    scored.sort_by(|a, b| {
        let sa = a.score.unwrap_or(0.0);
        let sb = b.score.unwrap_or(0.0);
        sb.total_cmp(&sa)
    });
    scored.truncate(top_n);

    RankedResult {
        casts: scored,
        total,
        ..RankedResult::default()
    }
}
