// src/provider/mod.rs
//! Provider identifiers, content items, the client capability and the
//! read-only registry the fetch engine resolves providers through.

pub mod http;
pub mod sample;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a content source, e.g. `"1"` or `"news"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(String);

impl Provider {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Provider {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One unit of content returned to feed consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub source: String, // provider id that produced the item
    pub summary: String,
    pub link: String,
    pub expiry: DateTime<Utc>,
}

/// Capability exposed by every upstream provider.
///
/// Implementations are shared across concurrently running fetch tasks, so
/// they must not mutate state observable by other callers. A successful call
/// returns exactly `count` items; anything short of that is an error.
#[async_trait::async_trait]
pub trait ContentClient: Send + Sync {
    async fn fetch(&self, requester: &str, count: usize) -> Result<Vec<ContentItem>>;
}

/// Convenient alias used by the registry and tests.
pub type DynContentClient = Arc<dyn ContentClient>;

/// Immutable map from provider id to its client, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<Provider, DynContentClient>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a second registration for the same id replaces the first.
    pub fn with(mut self, provider: impl Into<Provider>, client: DynContentClient) -> Self {
        self.clients.insert(provider.into(), client);
        self
    }

    pub fn get(&self, provider: &Provider) -> Option<&DynContentClient> {
        self.clients.get(provider)
    }

    pub fn contains(&self, provider: &Provider) -> bool {
        self.clients.contains_key(provider)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Registered ids, sorted for stable diagnostics.
    pub fn providers(&self) -> Vec<&Provider> {
        let mut ids: Vec<_> = self.clients.keys().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
