//! Cast front page: binary entrypoint.
//! Boots the Axum HTTP server with the Neynar-backed aggregation routes.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// Filter comes from `RUST_LOG`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cast_frontpage=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let router = cast_frontpage::app().await?;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .await
        .context("http server")?;
    Ok(())
}
