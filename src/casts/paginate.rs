//! Pagination driver: walks the upstream feed(s), normalizes each page and
//! accumulates candidates until one of the stop rules fires.
//!
//! Stop rules (first wins): empty page, missing or stalled cursor, page cap,
//! candidate cap, and in date-filtered mode a record older than today's UTC
//! midnight (feeds are assumed newest-first). An optional deadline bounds the
//! whole drive.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::feed::CastFeed;
use super::normalize::{normalize_cast, published_at, MissingTimestamp};
use super::types::{Cast, PageResult};
use crate::upstream::UpstreamError;

#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Casts requested per seed author.
    pub per_author_limit: u32,
    /// Casts requested per cursor page.
    pub page_limit: u32,
    pub max_pages: usize,
    pub candidate_cap: usize,
    /// Pause between seed-author batches.
    pub inter_request_delay: Duration,
    /// Seed authors fetched concurrently per batch (clamped to 1..=3).
    pub author_concurrency: usize,
    pub early_stop_on_stale: bool,
    pub request_budget: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            per_author_limit: 25,
            page_limit: 25,
            max_pages: 50,
            candidate_cap: 1000,
            inter_request_delay: Duration::from_millis(500),
            author_concurrency: 1,
            early_stop_on_stale: true,
            request_budget: None,
        }
    }
}

/// Inclusive `[start of current UTC day, now]` window in epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_ms: i64,
    pub now_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    Before,
    Inside,
    After,
}

impl DayWindow {
    pub fn today(now: DateTime<Utc>) -> Self {
        let start_ms = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis())
            .unwrap_or(0);
        Self {
            start_ms,
            now_ms: now.timestamp_millis(),
        }
    }

    pub fn position(&self, ts: i64) -> WindowPosition {
        if ts < self.start_ms {
            WindowPosition::Before
        } else if ts > self.now_ms {
            WindowPosition::After
        } else {
            WindowPosition::Inside
        }
    }
}

/// Which feed to walk and how to filter it.
#[derive(Debug, Clone, Copy)]
pub enum DriveMode<'a> {
    /// One bounded page per well-known author, filtered to today.
    SeedAuthors { handles: &'a [String], window: DayWindow },
    /// Cursor walk over the trending feed, filtered to today.
    Trending { window: DayWindow },
    /// Cursor walk over one author's casts, unfiltered.
    Author { fid: u64, now_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyPage,
    NoCursor,
    CursorStalled,
    MaxPages,
    CandidateCap,
    StaleRecord,
    AuthorsExhausted,
    Deadline,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropCounts {
    pub too_old: usize,
    pub future: usize,
    pub missing_timestamp: usize,
    pub duplicate: usize,
}

/// Everything a drive produced, including why it stopped.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub casts: Vec<Cast>,
    pub pages: usize,
    pub stop: StopReason,
    pub dropped: DropCounts,
    /// Error that ended the drive, or the last absorbed error when nothing
    /// at all could be fetched.
    pub failure: Option<UpstreamError>,
    pub requires_payment: bool,
}

#[derive(Debug, Clone, Copy)]
enum Filter {
    Today { window: DayWindow, early_stop: bool },
    Unfiltered { now_ms: i64 },
}

enum PageVerdict {
    Continue,
    Stale,
    Full,
}

struct Accumulator {
    casts: Vec<Cast>,
    seen: HashSet<String>,
    dropped: DropCounts,
    cap: usize,
    requires_payment: bool,
}

impl Accumulator {
    fn new(cap: usize) -> Self {
        Self {
            casts: Vec::new(),
            seen: HashSet::new(),
            dropped: DropCounts::default(),
            cap,
            requires_payment: false,
        }
    }

    fn is_full(&self) -> bool {
        self.casts.len() >= self.cap
    }

    fn ingest(&mut self, page: &[Value], filter: Filter) -> PageVerdict {
        for raw in page {
            if self.is_full() {
                return PageVerdict::Full;
            }
            let cast = match filter {
                Filter::Today { window, early_stop } => {
                    let Some(ts) = published_at(raw) else {
                        self.dropped.missing_timestamp += 1;
                        continue;
                    };
                    match window.position(ts) {
                        WindowPosition::Before => {
                            self.dropped.too_old += 1;
                            if early_stop {
                                return PageVerdict::Stale;
                            }
                            continue;
                        }
                        WindowPosition::After => {
                            self.dropped.future += 1;
                            continue;
                        }
                        WindowPosition::Inside => {}
                    }
                    match normalize_cast(raw, MissingTimestamp::Skip) {
                        Some(c) => c,
                        None => {
                            self.dropped.missing_timestamp += 1;
                            continue;
                        }
                    }
                }
                Filter::Unfiltered { now_ms } => {
                    match normalize_cast(raw, MissingTimestamp::DefaultTo(now_ms)) {
                        Some(c) => c,
                        None => continue,
                    }
                }
            };
            if !cast.id.is_empty() && !self.seen.insert(cast.id.clone()) {
                self.dropped.duplicate += 1;
                continue;
            }
            self.casts.push(cast);
        }
        if self.is_full() {
            PageVerdict::Full
        } else {
            PageVerdict::Continue
        }
    }

    fn note_error(&mut self, err: &UpstreamError) {
        if err.requires_payment() {
            self.requires_payment = true;
        }
    }

    fn finish(self, pages: usize, stop: StopReason, failure: Option<UpstreamError>) -> Harvest {
        counter!("casts_candidates_total").increment(self.casts.len() as u64);
        for (reason, n) in [
            ("too_old", self.dropped.too_old),
            ("future", self.dropped.future),
            ("missing_timestamp", self.dropped.missing_timestamp),
            ("duplicate", self.dropped.duplicate),
        ] {
            if n > 0 {
                counter!("casts_dropped_total", "reason" => reason).increment(n as u64);
            }
        }
        Harvest {
            casts: self.casts,
            pages,
            stop,
            dropped: self.dropped,
            failure,
            requires_payment: self.requires_payment,
        }
    }
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn after(budget: Option<Duration>) -> Self {
        Self(budget.map(|b| Instant::now() + b))
    }

    fn expired(&self) -> bool {
        self.0.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, Copy)]
enum CursorSource {
    Trending,
    Author(u64),
}

pub struct PageDriver<'a> {
    feed: &'a dyn CastFeed,
    cfg: &'a DriverConfig,
}

impl<'a> PageDriver<'a> {
    pub fn new(feed: &'a dyn CastFeed, cfg: &'a DriverConfig) -> Self {
        Self { feed, cfg }
    }

    pub async fn drive(&self, mode: DriveMode<'_>) -> Harvest {
        let deadline = Deadline::after(self.cfg.request_budget);
        let early_stop = self.cfg.early_stop_on_stale;
        let harvest = match mode {
            DriveMode::SeedAuthors { handles, window } => {
                self.drive_seed_authors(handles, Filter::Today { window, early_stop }, &deadline)
                    .await
            }
            DriveMode::Trending { window } => {
                self.drive_cursor(
                    CursorSource::Trending,
                    Filter::Today { window, early_stop },
                    &deadline,
                )
                .await
            }
            DriveMode::Author { fid, now_ms } => {
                self.drive_cursor(
                    CursorSource::Author(fid),
                    Filter::Unfiltered { now_ms },
                    &deadline,
                )
                .await
            }
        };
        info!(
            target: "paginate",
            feed = self.feed.name(),
            pages = harvest.pages,
            kept = harvest.casts.len(),
            stop = ?harvest.stop,
            too_old = harvest.dropped.too_old,
            future = harvest.dropped.future,
            missing_ts = harvest.dropped.missing_timestamp,
            duplicate = harvest.dropped.duplicate,
            failed = harvest.failure.is_some(),
            "drive finished"
        );
        harvest
    }

    async fn fetch(&self, source: CursorSource, cursor: Option<&str>) -> Result<PageResult, UpstreamError> {
        match source {
            CursorSource::Trending => self.feed.trending_page(cursor, self.cfg.page_limit).await,
            CursorSource::Author(fid) => {
                self.feed.author_page(fid, cursor, self.cfg.page_limit).await
            }
        }
    }

    async fn drive_cursor(&self, source: CursorSource, filter: Filter, deadline: &Deadline) -> Harvest {
        let mut acc = Accumulator::new(self.cfg.candidate_cap);
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        let mut failure = None;

        let stop = loop {
            if pages >= self.cfg.max_pages {
                break StopReason::MaxPages;
            }
            if deadline.expired() {
                break StopReason::Deadline;
            }
            let page = match self.fetch(source, cursor.as_deref()).await {
                Ok(p) => p,
                Err(err) => {
                    warn!(target: "paginate", ?source, page = pages + 1, error = %err, "page fetch failed");
                    acc.note_error(&err);
                    failure = Some(err);
                    break StopReason::Failed;
                }
            };
            pages += 1;
            debug!(
                target: "paginate",
                ?source,
                page = pages,
                records = page.casts.len(),
                next = ?page.next_cursor,
                "page fetched"
            );

            if page.casts.is_empty() {
                break StopReason::EmptyPage;
            }
            match acc.ingest(&page.casts, filter) {
                PageVerdict::Full => break StopReason::CandidateCap,
                PageVerdict::Stale => break StopReason::StaleRecord,
                PageVerdict::Continue => {}
            }
            match page.next_cursor {
                None => break StopReason::NoCursor,
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    break StopReason::CursorStalled
                }
                Some(next) => cursor = Some(next),
            }
        };

        acc.finish(pages, stop, failure)
    }

    async fn author_by_handle(&self, handle: &str) -> Result<Option<PageResult>, UpstreamError> {
        let Some(fid) = self.feed.lookup_fid(handle).await? else {
            return Ok(None);
        };
        self.feed
            .author_page(fid, None, self.cfg.per_author_limit)
            .await
            .map(Some)
    }

    async fn drive_seed_authors(&self, handles: &[String], filter: Filter, deadline: &Deadline) -> Harvest {
        let mut acc = Accumulator::new(self.cfg.candidate_cap);
        let batch = self.cfg.author_concurrency.clamp(1, 3);
        let mut pages = 0usize;
        let mut succeeded = 0usize;
        let mut last_error = None;
        let mut stop = StopReason::AuthorsExhausted;

        'batches: for (i, chunk) in handles.chunks(batch).enumerate() {
            if i > 0 && !self.cfg.inter_request_delay.is_zero() {
                tokio::time::sleep(self.cfg.inter_request_delay).await;
            }
            if deadline.expired() {
                stop = StopReason::Deadline;
                break;
            }
            if pages >= self.cfg.max_pages {
                stop = StopReason::MaxPages;
                break;
            }

            let results = join_all(chunk.iter().map(|h| self.author_by_handle(h))).await;
            for (handle, res) in chunk.iter().zip(results) {
                match res {
                    Ok(Some(page)) => {
                        pages += 1;
                        succeeded += 1;
                        debug!(target: "paginate", handle = %handle, records = page.casts.len(), "author page fetched");
                        if let PageVerdict::Full = acc.ingest(&page.casts, filter) {
                            stop = StopReason::CandidateCap;
                            break 'batches;
                        }
                    }
                    Ok(None) => {
                        succeeded += 1;
                        warn!(target: "paginate", handle = %handle, "no fid for handle");
                    }
                    Err(err) if err.is_fatal() => {
                        acc.note_error(&err);
                        let pages_done = pages;
                        return acc.finish(pages_done, StopReason::Failed, Some(err));
                    }
                    Err(err) => {
                        warn!(target: "paginate", handle = %handle, error = %err, "author skipped");
                        acc.note_error(&err);
                        last_error = Some(err);
                    }
                }
            }
        }

        let failure = if succeeded == 0 { last_error } else { None };
        let stop = if failure.is_some() { StopReason::Failed } else { stop };
        acc.finish(pages, stop, failure)
    }
}
