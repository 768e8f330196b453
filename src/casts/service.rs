//! The two public aggregation operations.
//!
//! Contract: always hand back a renderable [`RankedResult`]. Upstream trouble
//! degrades to an empty payload with `error`, or to a partial ranked payload
//! when some candidates were already collected. Only a malformed author id
//! is reported as an error to the caller.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};

use super::feed::CastFeed;
use super::paginate::{DayWindow, DriveMode, DriverConfig, Harvest, PageDriver, StopReason};
use super::rank::{rank, ScoringPolicy, AUTHOR_TOP_N, TODAY_TOP_N};
use super::types::RankedResult;
use crate::config::GlobalSource;
use crate::upstream::UpstreamError;

const PAYMENT_REQUIRED_MSG: &str =
    "Upstream API requires a paid plan for this endpoint; upgrade the API key or use a different data source";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAuthorId {
    #[error("author id parameter is required")]
    Missing,
    #[error("invalid author id parameter: {0:?}")]
    NotAnInteger(String),
}

/// Parse a numeric author id (FID). Surrounding whitespace is ignored; signs,
/// fractions and trailing garbage are rejected.
pub fn parse_author_id(raw: Option<&str>) -> Result<u64, InvalidAuthorId> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(InvalidAuthorId::Missing)?;
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidAuthorId::NotAnInteger(raw.to_string()));
    }
    raw.parse::<u64>()
        .map_err(|_| InvalidAuthorId::NotAnInteger(raw.to_string()))
}

pub struct CastService {
    feed: Arc<dyn CastFeed>,
    driver: DriverConfig,
    global_source: GlobalSource,
    seed_authors: Vec<String>,
}

impl CastService {
    pub fn new(
        feed: Arc<dyn CastFeed>,
        driver: DriverConfig,
        global_source: GlobalSource,
        seed_authors: Vec<String>,
    ) -> Self {
        Self {
            feed,
            driver,
            global_source,
            seed_authors,
        }
    }

    pub fn feed(&self) -> &dyn CastFeed {
        self.feed.as_ref()
    }

    /// Today's top casts across the configured global source.
    pub async fn today_top_casts(&self) -> RankedResult {
        self.today_top_casts_at(Utc::now()).await
    }

    pub async fn today_top_casts_at(&self, now: DateTime<Utc>) -> RankedResult {
        let started = Instant::now();
        let window = DayWindow::today(now);
        let mode = match self.global_source {
            GlobalSource::Authors => DriveMode::SeedAuthors {
                handles: &self.seed_authors,
                window,
            },
            GlobalSource::Trending => DriveMode::Trending { window },
        };
        let harvest = PageDriver::new(self.feed.as_ref(), &self.driver).drive(mode).await;
        let out = settle(harvest, ScoringPolicy::EngagementOnly, TODAY_TOP_N, "today");
        histogram!("casts_aggregation_ms", "op" => "today").record(started.elapsed().as_secs_f64() * 1_000.0);
        out
    }

    /// Top casts of a single author. The raw query value is validated here.
    pub async fn author_top_casts(&self, raw_id: Option<&str>) -> Result<RankedResult, InvalidAuthorId> {
        let fid = parse_author_id(raw_id)?;
        Ok(self.author_top_casts_at(fid, Utc::now()).await)
    }

    pub async fn author_top_casts_at(&self, fid: u64, now: DateTime<Utc>) -> RankedResult {
        let started = Instant::now();
        let now_ms = now.timestamp_millis();
        let harvest = PageDriver::new(self.feed.as_ref(), &self.driver)
            .drive(DriveMode::Author { fid, now_ms })
            .await;
        let out = settle(
            harvest,
            ScoringPolicy::RecencyWeighted { now_ms },
            AUTHOR_TOP_N,
            "author",
        );
        histogram!("casts_aggregation_ms", "op" => "author").record(started.elapsed().as_secs_f64() * 1_000.0);
        out
    }
}

/// Turn a drive into the response payload per the degrade rules.
fn settle(harvest: Harvest, policy: ScoringPolicy, top_n: usize, op: &'static str) -> RankedResult {
    let Harvest {
        casts,
        stop,
        failure,
        requires_payment,
        ..
    } = harvest;

    if casts.is_empty() {
        if let Some(err) = failure {
            counter!("casts_degraded_total", "op" => op).increment(1);
            warn!(target: "casts", op, error = %err, "no candidates; degraded response");
            return RankedResult {
                requires_payment,
                ..RankedResult::degraded(describe(&err, requires_payment))
            };
        }
    }

    let mut out = rank(casts, policy, top_n);
    out.requires_payment = requires_payment;
    match (failure, stop) {
        (Some(err), _) => {
            counter!("casts_degraded_total", "op" => op).increment(1);
            warn!(target: "casts", op, kept = out.total, error = %err, "returning partial result");
            out.partial = true;
            out.error = Some(describe(&err, requires_payment));
        }
        (None, _) if requires_payment => {
            // some seed authors were skipped behind the paywall
            counter!("casts_degraded_total", "op" => op).increment(1);
            warn!(target: "casts", op, kept = out.total, "payment required for part of the source; returning partial result");
            out.partial = true;
            out.error = Some(PAYMENT_REQUIRED_MSG.to_string());
        }
        (None, StopReason::Deadline) => {
            counter!("casts_degraded_total", "op" => op).increment(1);
            out.partial = true;
            out.error = Some("request budget exhausted before pagination finished".into());
        }
        (None, _) => {}
    }
    info!(target: "casts", op, returned = out.casts.len(), total = out.total, partial = out.partial, "ranked");
    out
}

fn describe(err: &UpstreamError, requires_payment: bool) -> String {
    if requires_payment {
        PAYMENT_REQUIRED_MSG.to_string()
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_id_parsing() {
        assert_eq!(parse_author_id(Some("42")), Ok(42));
        assert_eq!(parse_author_id(Some(" 7 ")), Ok(7));
        assert_eq!(parse_author_id(None), Err(InvalidAuthorId::Missing));
        assert_eq!(parse_author_id(Some("")), Err(InvalidAuthorId::Missing));
        assert!(matches!(parse_author_id(Some("abc")), Err(InvalidAuthorId::NotAnInteger(_))));
        assert!(matches!(parse_author_id(Some("42abc")), Err(InvalidAuthorId::NotAnInteger(_))));
        assert!(matches!(parse_author_id(Some("-1")), Err(InvalidAuthorId::NotAnInteger(_))));
        assert!(matches!(
            parse_author_id(Some("99999999999999999999999")),
            Err(InvalidAuthorId::NotAnInteger(_))
        ));
    }
}
