// tests/common/mod.rs
//
// Scripted in-memory feed for driving the pagination/aggregation code without
// a network. Each queue hands out one response per call; an exhausted queue
// answers with an empty page.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cast_frontpage::casts::{CastFeed, PageResult};
use cast_frontpage::upstream::{Result, UpstreamError};
use serde_json::{json, Value};

#[derive(Default)]
pub struct ScriptedFeed {
    trending: Mutex<VecDeque<Result<PageResult>>>,
    authors: Mutex<HashMap<u64, VecDeque<Result<PageResult>>>>,
    fids: HashMap<String, Result<Option<u64>>>,
    pub calls: AtomicUsize,
    pub cursors_seen: Mutex<Vec<Option<String>>>,
    /// When each handle lookup started (tokio clock, so paused tests see virtual time).
    pub lookups_at: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trending(self, pages: Vec<Result<PageResult>>) -> Self {
        *self.trending.lock().unwrap() = pages.into();
        self
    }

    pub fn author(self, fid: u64, pages: Vec<Result<PageResult>>) -> Self {
        self.authors.lock().unwrap().insert(fid, pages.into());
        self
    }

    pub fn handle(mut self, handle: &str, fid: Result<Option<u64>>) -> Self {
        self.fids.insert(handle.to_string(), fid);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CastFeed for ScriptedFeed {
    async fn lookup_fid(&self, handle: &str) -> Result<Option<u64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lookups_at.lock().unwrap().push(tokio::time::Instant::now());
        self.fids.get(handle).cloned().unwrap_or(Ok(None))
    }

    async fn author_page(&self, fid: u64, cursor: Option<&str>, _limit: u32) -> Result<PageResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors_seen.lock().unwrap().push(cursor.map(str::to_string));
        let mut authors = self.authors.lock().unwrap();
        authors
            .get_mut(&fid)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(PageResult::default()))
    }

    async fn trending_page(&self, cursor: Option<&str>, _limit: u32) -> Result<PageResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors_seen.lock().unwrap().push(cursor.map(str::to_string));
        self.trending
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PageResult::default()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Raw upstream record in the current Neynar shape.
pub fn raw_cast(hash: &str, likes: u64, recasts: u64, replies: u64, ts_ms: i64) -> Value {
    json!({
        "hash": hash,
        "text": format!("cast {hash}"),
        "timestamp": ts_ms,
        "author": { "fid": 1, "username": "tester", "display_name": "Tester" },
        "reactions": { "likes_count": likes, "recasts_count": recasts },
        "replies": { "count": replies },
        "embeds": []
    })
}

pub fn page(casts: Vec<Value>, next: Option<&str>) -> Result<PageResult> {
    Ok(PageResult {
        casts,
        next_cursor: next.map(str::to_string),
    })
}

pub fn rate_limited() -> UpstreamError {
    UpstreamError::RateLimited { retry_after: None }
}
