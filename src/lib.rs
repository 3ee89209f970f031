// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod assemble;
pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod metrics;
pub mod mix;
pub mod provider;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::FeedConfig;
pub use crate::dispatch::{dispatch, FeedContext, Window};
pub use crate::mix::{MixPlan, Slot};
pub use crate::provider::{ContentClient, ContentItem, Provider, ProviderRegistry};

use axum::Router;
use tracing::info;

/// Build the full application router (feed API + `/metrics`) from `config`.
pub fn app(config: &FeedConfig) -> anyhow::Result<Router> {
    let ctx = config.build_context()?;
    let metrics = crate::metrics::Metrics::init(config.fetch_timeout_ms)?;

    info!(
        target: "feed",
        slots = ctx.plan().len(),
        providers = ctx.registry().len(),
        fetch_timeout_ms = config.fetch_timeout_ms,
        max_count = config.max_count,
        "feed context ready"
    );

    let state = api::AppState::new(ctx, config.max_count);
    Ok(router(state).merge(metrics.router()))
}
