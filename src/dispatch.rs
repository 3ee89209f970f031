// src/dispatch.rs
//! Dispatcher: fans a requested window out into one fetch task per position
//! and hands the collected outcomes to the assembler once every task is done.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::assemble::assemble;
use crate::fetch::FetchTask;
use crate::mix::{MixError, MixPlan};
use crate::provider::{ContentItem, ProviderRegistry};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(2000);

/// Read-only state shared by every request: registry, plan and the per-call deadline.
#[derive(Debug)]
pub struct FeedContext {
    registry: ProviderRegistry,
    plan: MixPlan,
    fetch_timeout: Duration,
}

impl FeedContext {
    /// Fails if the plan references a provider the registry can't serve.
    pub fn new(
        registry: ProviderRegistry,
        plan: MixPlan,
        fetch_timeout: Duration,
    ) -> Result<Self, MixError> {
        plan.validate(&registry)?;
        Ok(Self {
            registry,
            plan,
            fetch_timeout,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn plan(&self) -> &MixPlan {
        &self.plan
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}

/// A slice of the infinite cyclic feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub count: usize,
}

impl Window {
    pub fn new(offset: u64, count: usize) -> Self {
        Self { offset, count }
    }
}

/// Resolve `window` into content, in position order, truncated at the first failed position.
pub async fn dispatch(ctx: Arc<FeedContext>, window: Window, requester: Arc<str>) -> Vec<ContentItem> {
    if window.count == 0 {
        return Vec::new();
    }
    let t0 = Instant::now();
    let base = ctx.plan().base_position(window.offset);

    let mut tasks = JoinSet::new();
    for ordinal in 0..window.count {
        let (handoff, ordinal_rx) = oneshot::channel::<usize>();
        let ctx = Arc::clone(&ctx);
        let requester = Arc::clone(&requester);
        tasks.spawn(async move {
            let ordinal = ordinal_rx.await.ok()?;
            let position = base + ordinal as u64;
            Some(FetchTask::new(&ctx, &requester, ordinal, position).run().await)
        });
        // Single sender: ordinals follow spawn order; completion order is free.
        let _ = handoff.send(ordinal);
    }

    let mut outcomes = Vec::with_capacity(window.count);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) => tracing::warn!(target: "feed", "fetch task never received its ordinal"),
            Err(e) => tracing::warn!(target: "feed", error = ?e, "fetch task aborted"),
        }
    }

    let result = assemble(window.count, outcomes);

    histogram!("feed_dispatch_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
    counter!("feed_items_served_total").increment(result.len() as u64);
    tracing::info!(
        target: "feed",
        offset = window.offset,
        count = window.count,
        served = result.len(),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "window dispatched"
    );
    result
}
