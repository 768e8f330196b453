// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod api;
pub mod casts;
pub mod config;
pub mod metrics;
pub mod upstream;

pub use crate::api::{router, AppState};
pub use crate::casts::{Cast, CastService, RankedResult};
pub use crate::config::FrontpageConfig;

use anyhow::Context;
use tracing::info;

/// Build the full in-process app: config from file/env, Neynar-backed
/// service, and `/metrics` when debug routes are enabled.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = FrontpageConfig::load_default().context("loading frontpage config")?;
    info!(
        api_base = %cfg.api_base,
        source = ?cfg.global_source,
        seed_authors = cfg.seed_authors.len(),
        api_key_present = cfg.api_key.is_some(),
        "frontpage config loaded"
    );
    let state = AppState::from_config(&cfg)?;
    let metrics = crate::metrics::Metrics::init()?;

    let mut router = api::router(state);
    if api::debug_routes_enabled() {
        router = router.merge(metrics.router());
    }
    Ok(router)
}
