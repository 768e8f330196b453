use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")?;
                describe_all();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// `/metrics` scrape route for the upstream and aggregation series.
    /// Mounted next to the debug routes only.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route("/metrics", get(move || render(handle.clone())))
    }
}

async fn render(handle: PrometheusHandle) -> String {
    handle.render()
}

fn describe_all() {
    describe_counter!("upstream_requests_total", "Upstream request attempts by outcome.");
    describe_counter!("upstream_retries_total", "Upstream retries after 429 or transient errors.");
    describe_counter!("casts_candidates_total", "Casts accumulated by pagination drives.");
    describe_counter!("casts_dropped_total", "Raw records dropped during a drive, by reason.");
    describe_counter!("casts_degraded_total", "Responses served partial or empty due to upstream failure.");
    describe_histogram!("casts_aggregation_ms", "End-to-end aggregation time in milliseconds.");
}
