// src/provider/sample.rs
//! In-process providers: a synthetic item generator and an always-failing source.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::{ContentClient, ContentItem, Provider};

/// Generates synthetic items tagged with its own provider id.
#[derive(Debug, Clone)]
pub struct SampleProvider {
    source: Provider,
    latency: Option<Duration>,
}

impl SampleProvider {
    pub fn new(source: impl Into<Provider>) -> Self {
        Self {
            source: source.into(),
            latency: None,
        }
    }

    /// Delay every call, to emulate a slow upstream.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn generate(&self, count: usize) -> Vec<ContentItem> {
        let mut rng = rand::rng();
        (0..count)
            .map(|_| {
                let id = format!("{:016x}", rng.random::<u64>());
                ContentItem {
                    title: format!("Sample item {id}"),
                    source: self.source.to_string(),
                    summary: format!("Synthetic content from provider {}", self.source),
                    link: format!("https://content.example/{}/{id}", self.source),
                    expiry: Utc::now() + chrono::Duration::hours(24),
                    id,
                }
            })
            .collect()
    }
}

#[async_trait]
impl ContentClient for SampleProvider {
    async fn fetch(&self, _requester: &str, count: usize) -> Result<Vec<ContentItem>> {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        Ok(self.generate(count))
    }
}

/// Provider that never yields content.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    source: Provider,
}

impl FailingProvider {
    pub fn new(source: impl Into<Provider>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl ContentClient for FailingProvider {
    async fn fetch(&self, _requester: &str, _count: usize) -> Result<Vec<ContentItem>> {
        bail!("provider {} is unavailable", self.source)
    }
}
