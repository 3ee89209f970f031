use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and publish the fetch deadline.
    pub fn init(fetch_timeout_ms: u64) -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();

        gauge!("feed_fetch_timeout_ms").set(fetch_timeout_ms as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("feed_requests_total", "Feed window requests accepted.");
    describe_counter!("feed_items_served_total", "Content items returned to callers.");
    describe_counter!(
        "feed_positions_failed_total",
        "Positions where primary and fallback both failed."
    );
    describe_counter!("feed_fallback_used_total", "Fallback provider calls issued.");
    describe_counter!(
        "feed_provider_errors_total",
        "Provider call failures, including deadline expiry."
    );
    describe_histogram!("feed_dispatch_ms", "Window dispatch time in milliseconds.");
    describe_gauge!("feed_fetch_timeout_ms", "Per-call provider deadline.");
}
