use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::casts::{CastFeed, CastService, NeynarFeed};
use crate::config::FrontpageConfig;
use crate::upstream::{ProbeReport, RetryPolicy, UpstreamClient};

const CACHE_CONTROL_TODAY: &str = "public, s-maxage=60, stale-while-revalidate=300";

#[derive(Clone)]
pub struct AppState {
    casts: Arc<CastService>,
    /// Present when wired to the real upstream; used by the probe route.
    upstream: Option<Arc<NeynarFeed>>,
}

impl AppState {
    pub fn from_config(cfg: &FrontpageConfig) -> anyhow::Result<Self> {
        Self::from_config_with_retry(cfg, RetryPolicy::default())
    }

    pub fn from_config_with_retry(cfg: &FrontpageConfig, policy: RetryPolicy) -> anyhow::Result<Self> {
        let client = UpstreamClient::new(cfg.api_base.clone(), cfg.api_key.clone(), policy)?;
        let neynar = Arc::new(NeynarFeed::new(client));
        let feed: Arc<dyn CastFeed> = neynar.clone();
        let service = CastService::new(
            feed,
            cfg.driver_config(),
            cfg.global_source,
            cfg.seed_authors.clone(),
        );
        Ok(Self {
            casts: Arc::new(service),
            upstream: Some(neynar),
        })
    }

    /// State around an arbitrary feed (scripted feeds in tests).
    pub fn with_service(service: CastService) -> Self {
        Self {
            casts: Arc::new(service),
            upstream: None,
        }
    }
}

/// Diagnostics routes are opt-in: `DEBUG_ROUTES=1`.
pub fn debug_routes_enabled() -> bool {
    std::env::var("DEBUG_ROUTES").is_ok_and(|v| v == "1")
}

pub fn router(state: AppState) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/casts/today", get(casts_today))
        .route("/casts/user", get(casts_user));
    if debug_routes_enabled() {
        r = r.route("/debug/upstream", get(debug_upstream));
    }
    r.layer(CorsLayer::very_permissive()).with_state(state)
}

async fn casts_today(State(state): State<AppState>) -> Response {
    let out = state.casts.today_top_casts().await;
    let degraded = out.is_degraded();
    let mut resp = Json(out).into_response();
    if !degraded {
        resp.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_TODAY),
        );
    }
    resp
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

async fn casts_user(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    // `fid` is the legacy name of the parameter
    let raw = ["id", "fid"]
        .iter()
        .filter_map(|k| q.get(*k))
        .map(String::as_str)
        .find(|v| !v.trim().is_empty());
    match state.casts.author_top_casts(raw).await {
        Ok(out) => Json(out).into_response(),
        Err(e) => {
            info!(target: "api", error = %e, "rejected /casts/user request");
            (StatusCode::BAD_REQUEST, Json(ErrorBody { error: e.to_string() })).into_response()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamDiagnostics {
    timestamp: String,
    feed: &'static str,
    api_base: Option<String>,
    api_key_present: bool,
    api_key_length: usize,
    api_key_fingerprint: Option<String>,
    probe: Option<ProbeReport>,
}

async fn debug_upstream(State(state): State<AppState>) -> Json<UpstreamDiagnostics> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    let feed = state.casts.feed().name();
    let Some(neynar) = state.upstream.as_ref() else {
        return Json(UpstreamDiagnostics {
            timestamp,
            feed,
            api_base: None,
            api_key_present: false,
            api_key_length: 0,
            api_key_fingerprint: None,
            probe: None,
        });
    };
    let key = neynar.client().api_key();
    let probe = neynar.probe().await;
    Json(UpstreamDiagnostics {
        timestamp,
        feed,
        api_base: Some(neynar.client().base_url().to_string()),
        api_key_present: key.is_some(),
        api_key_length: key.map(str::len).unwrap_or(0),
        api_key_fingerprint: key.map(key_fingerprint),
        probe: Some(probe),
    })
}

/// First 6 bytes of SHA-256, hex. Identifies a key without revealing it.
pub(crate) fn key_fingerprint(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_short_stable_hex() {
        let a = key_fingerprint("NEYNAR_API_DOCS");
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, key_fingerprint("NEYNAR_API_DOCS"));
        assert_ne!(a, key_fingerprint("other"));
    }
}
