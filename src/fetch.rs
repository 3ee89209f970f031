// src/fetch.rs
//! Fetch task: resolves one output position to exactly one outcome.
//!
//! `Pending → FetchingPrimary → (Success | FetchingFallback) → (Success | Failed)`.
//! One fallback attempt at most, no retries, no backoff. Each provider call is
//! bounded by the context's deadline; an expired call counts as a failure.

use anyhow::{anyhow, Result};
use metrics::counter;

use crate::dispatch::FeedContext;
use crate::mix::Slot;
use crate::provider::{ContentItem, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    FetchingPrimary,
    FetchingFallback,
    Success,
    Failed,
}

/// Result of one fetch task; `item == None` marks a failed position.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub ordinal: usize,
    pub position: u64,
    pub item: Option<ContentItem>,
}

pub struct FetchTask<'a> {
    ctx: &'a FeedContext,
    requester: &'a str,
    ordinal: usize,
    position: u64,
    state: FetchState,
}

impl<'a> FetchTask<'a> {
    pub fn new(ctx: &'a FeedContext, requester: &'a str, ordinal: usize, position: u64) -> Self {
        Self {
            ctx,
            requester,
            ordinal,
            position,
            state: FetchState::Pending,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    fn transition(&mut self, next: FetchState) {
        tracing::debug!(
            target: "feed",
            ordinal = self.ordinal,
            position = self.position,
            from = ?self.state,
            to = ?next,
            "fetch state"
        );
        self.state = next;
    }

    /// Drive the task to a terminal state and report its outcome.
    pub async fn run(mut self) -> Outcome {
        let ctx = self.ctx;
        let slot: &Slot = ctx.plan().resolve(self.position);

        self.transition(FetchState::FetchingPrimary);
        let mut item = match self.fetch_one(&slot.primary).await {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(
                    target: "feed",
                    error = ?e,
                    provider = %slot.primary,
                    position = self.position,
                    "primary fetch failed"
                );
                counter!("feed_provider_errors_total", "provider" => slot.primary.to_string())
                    .increment(1);
                None
            }
        };

        if item.is_none() {
            if let Some(fallback) = &slot.fallback {
                self.transition(FetchState::FetchingFallback);
                counter!("feed_fallback_used_total").increment(1);
                match self.fetch_one(fallback).await {
                    Ok(it) => item = Some(it),
                    Err(e) => {
                        tracing::warn!(
                            target: "feed",
                            error = ?e,
                            provider = %fallback,
                            position = self.position,
                            "fallback fetch failed"
                        );
                        counter!("feed_provider_errors_total", "provider" => fallback.to_string())
                            .increment(1);
                    }
                }
            }
        }

        if item.is_some() {
            self.transition(FetchState::Success);
        } else {
            self.transition(FetchState::Failed);
            counter!("feed_positions_failed_total").increment(1);
        }

        Outcome {
            ordinal: self.ordinal,
            position: self.position,
            item,
        }
    }

    /// One bounded call for a single item.
    async fn fetch_one(&self, provider: &Provider) -> Result<ContentItem> {
        let client = self
            .ctx
            .registry()
            .get(provider)
            .ok_or_else(|| anyhow!("provider {provider} is not registered"))?;

        let deadline = self.ctx.fetch_timeout();
        let mut items = tokio::time::timeout(deadline, client.fetch(self.requester, 1))
            .await
            .map_err(|_| anyhow!("provider {provider} timed out after {deadline:?}"))??;

        if items.len() > 1 {
            tracing::warn!(
                target: "feed",
                provider = %provider,
                returned = items.len(),
                "provider returned more items than requested; keeping the first"
            );
        }
        if items.is_empty() {
            return Err(anyhow!("provider {provider} returned no items"));
        }
        Ok(items.swap_remove(0))
    }
}
