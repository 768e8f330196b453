// tests/metrics_route.rs
//
// The Prometheus recorder is process-global, so this lives in its own test
// binary. Runs one aggregation and checks the exposition output.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use cast_frontpage::casts::paginate::DriverConfig;
use cast_frontpage::casts::CastService;
use cast_frontpage::config::GlobalSource;
use cast_frontpage::metrics::Metrics;
use chrono::Utc;
use common::{page, raw_cast, ScriptedFeed};
use tower::ServiceExt as _;

#[tokio::test]
async fn aggregation_series_show_up_in_metrics() {
    let metrics = Metrics::init().expect("metrics init");
    // second init reuses the installed recorder
    Metrics::init().expect("metrics re-init");

    let now = Utc::now();
    let ts = now.timestamp_millis();
    let feed = ScriptedFeed::new().trending(vec![page(vec![raw_cast("a", 1, 0, 0, ts), raw_cast("b", 2, 0, 0, ts)], None)]);
    let driver = DriverConfig {
        inter_request_delay: Duration::ZERO,
        ..DriverConfig::default()
    };
    let svc = CastService::new(Arc::new(feed), driver, GlobalSource::Trending, Vec::new());
    let out = svc.today_top_casts_at(now).await;
    assert_eq!(out.total, 2);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = metrics.router().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("casts_candidates_total"), "{text}");
    assert!(text.contains("casts_aggregation_ms"), "{text}");
}
