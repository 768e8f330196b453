// src/casts/feed.rs
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::types::PageResult;
use crate::upstream::{Result, UpstreamClient};

/// The three upstream reads the pagination driver needs.
#[async_trait]
pub trait CastFeed: Send + Sync {
    /// Resolve a handle to its FID; `Ok(None)` when the payload has none.
    async fn lookup_fid(&self, handle: &str) -> Result<Option<u64>>;
    async fn author_page(&self, fid: u64, cursor: Option<&str>, limit: u32) -> Result<PageResult>;
    async fn trending_page(&self, cursor: Option<&str>, limit: u32) -> Result<PageResult>;
    fn name(&self) -> &'static str;
}

const USER_BY_USERNAME: &str = "/farcaster/user/by_username";
const USER_CASTS: &str = "/farcaster/feed/user/casts";
const TRENDING: &str = "/farcaster/feed/trending";

const CASTS_RULES: &[&str] = &["/casts", "/result/casts"];
const CURSOR_RULES: &[&str] = &["/next/cursor", "/result/next/cursor"];
const FID_RULES: &[&str] = &["/user/fid", "/result/user/fid", "/result/fid", "/fid"];

/// Neynar v2 implementation over [`UpstreamClient`].
pub struct NeynarFeed {
    client: UpstreamClient,
}

impl NeynarFeed {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    /// Cheap request used by the diagnostics route.
    pub async fn probe(&self) -> crate::upstream::ProbeReport {
        self.client
            .probe(TRENDING, &[("limit", "1".to_string())])
            .await
    }

    async fn page(&self, path: &str, mut query: Vec<(&str, String)>, cursor: Option<&str>) -> Result<PageResult> {
        if let Some(c) = cursor {
            query.push(("cursor", c.to_string()));
        }
        let body = self.client.get(path, &query).await?;
        Ok(parse_page(&body, path))
    }
}

#[async_trait]
impl CastFeed for NeynarFeed {
    async fn lookup_fid(&self, handle: &str) -> Result<Option<u64>> {
        let body = self
            .client
            .get(USER_BY_USERNAME, &[("username", handle.to_string())])
            .await?;
        Ok(parse_json(&body, USER_BY_USERNAME).and_then(|v| {
            FID_RULES
                .iter()
                .find_map(|p| v.pointer(p).and_then(Value::as_u64))
        }))
    }

    async fn author_page(&self, fid: u64, cursor: Option<&str>, limit: u32) -> Result<PageResult> {
        let query = vec![("fid", fid.to_string()), ("limit", limit.to_string())];
        self.page(USER_CASTS, query, cursor).await
    }

    async fn trending_page(&self, cursor: Option<&str>, limit: u32) -> Result<PageResult> {
        let query = vec![("limit", limit.to_string())];
        self.page(TRENDING, query, cursor).await
    }

    fn name(&self) -> &'static str {
        "neynar"
    }
}

fn parse_json(body: &str, path: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "upstream", path, error = %e, "unparseable upstream body");
            None
        }
    }
}

/// Unparseable bodies become an empty page.
pub(crate) fn parse_page(body: &str, path: &str) -> PageResult {
    let Some(v) = parse_json(body, path) else {
        return PageResult::default();
    };
    let casts = CASTS_RULES
        .iter()
        .find_map(|p| v.pointer(p).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();
    let next_cursor = CURSOR_RULES
        .iter()
        .find_map(|p| v.pointer(p).and_then(Value::as_str))
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    PageResult { casts, next_cursor }
}
