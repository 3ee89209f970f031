// src/provider/http.rs
//! Upstream provider reached over HTTP.
//!
//! Calls `GET {url}?requester=<key>&count=<n>` and expects a JSON array of
//! [`ContentItem`]s. Non-2xx statuses and short lists are errors.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::{ContentClient, ContentItem, Provider};

pub struct HttpProvider {
    source: Provider,
    url: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(source: impl Into<Provider>, url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(source, url, Duration::from_secs(10))
    }

    /// `timeout` bounds the whole HTTP exchange; the fetch engine applies its own deadline on top.
    pub fn with_timeout(
        source: impl Into<Provider>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            source: source.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ContentClient for HttpProvider {
    async fn fetch(&self, requester: &str, count: usize) -> Result<Vec<ContentItem>> {
        let count_param = count.to_string();
        let resp = self
            .client
            .get(&self.url)
            .query(&[("requester", requester), ("count", count_param.as_str())])
            .send()
            .await
            .with_context(|| format!("requesting provider {} at {}", self.source, self.url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("provider {} responded with {}", self.source, status);
        }

        let items: Vec<ContentItem> = resp
            .json()
            .await
            .with_context(|| format!("decoding items from provider {}", self.source))?;
        if items.len() < count {
            bail!(
                "provider {} returned {} items, wanted {}",
                self.source,
                items.len(),
                count
            );
        }
        Ok(items)
    }
}
