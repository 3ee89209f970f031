// src/config.rs
//! Startup configuration: providers, mix plan and fetch limits.
//!
//! Lookup order for the config file:
//! 1) $FEED_CONFIG_PATH
//! 2) config/feed.toml
//! 3) config/feed.json
//! 4) built-in default (sample providers 1–3, eight-slot mix)
//!
//! `FEED_FETCH_TIMEOUT_MS` and `FEED_MAX_COUNT` override the file values.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::FeedContext;
use crate::mix::{MixPlan, Slot};
use crate::provider::http::HttpProvider;
use crate::provider::sample::{FailingProvider, SampleProvider};
use crate::provider::{DynContentClient, Provider, ProviderRegistry};

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_FETCH_TIMEOUT_MS: &str = "FEED_FETCH_TIMEOUT_MS";
pub const ENV_MAX_COUNT: &str = "FEED_MAX_COUNT";

pub const DEFAULT_CONFIG_TOML: &str = "config/feed.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/feed.json";

fn default_fetch_timeout_ms() -> u64 {
    2000
}
fn default_max_count() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Deadline for a single provider call; expiry counts as a failure.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Largest window a single request may ask for.
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    pub providers: Vec<ProviderSpec>,
    pub mix: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: Provider,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderKind {
    Sample {
        #[serde(default)]
        latency_ms: Option<u64>,
    },
    Failing,
    Http {
        url: String,
    },
}

impl Default for FeedConfig {
    fn default() -> Self {
        let sample = |id: &str| ProviderSpec {
            id: Provider::from(id),
            kind: ProviderKind::Sample { latency_ms: None },
        };
        let s1 = Slot::new("1").with_fallback("2");
        let s2 = Slot::new("2").with_fallback("3");
        let s3 = Slot::new("3").with_fallback("1");
        let s4 = Slot::new("1");
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_count: default_max_count(),
            providers: vec![sample("1"), sample("2"), sample("3")],
            mix: vec![
                s1.clone(),
                s1.clone(),
                s2.clone(),
                s3,
                s4,
                s1.clone(),
                s1,
                s2,
            ],
        }
    }
}

impl FeedConfig {
    /// Load from an explicit path. Format follows the extension (TOML unless `.json`).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_TOML).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_TOML))?
        } else if Path::new(DEFAULT_CONFIG_JSON).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_JSON))?
        } else {
            tracing::info!(target: "feed", "no feed config found, using built-in default");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn parse(s: &str, ext: &str) -> Result<Self> {
        if ext == "json" {
            Ok(serde_json::from_str(s)?)
        } else {
            Ok(toml::from_str(s)?)
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_FETCH_TIMEOUT_MS) {
            self.fetch_timeout_ms = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_MS}={v} is not a number"))?;
        }
        if let Ok(v) = std::env::var(ENV_MAX_COUNT) {
            self.max_count = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_COUNT}={v} is not a number"))?;
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Instantiate every provider client. Provider ids must be unique.
    pub fn build_registry(&self) -> Result<ProviderRegistry> {
        let mut seen = HashSet::new();
        let mut registry = ProviderRegistry::new();
        for spec in &self.providers {
            if !seen.insert(spec.id.clone()) {
                bail!("provider `{}` is configured more than once", spec.id);
            }
            let client: DynContentClient = match &spec.kind {
                ProviderKind::Sample { latency_ms } => {
                    let mut p = SampleProvider::new(spec.id.clone());
                    if let Some(ms) = latency_ms {
                        p = p.with_latency(Duration::from_millis(*ms));
                    }
                    Arc::new(p)
                }
                ProviderKind::Failing => Arc::new(FailingProvider::new(spec.id.clone())),
                ProviderKind::Http { url } => Arc::new(
                    HttpProvider::new(spec.id.clone(), url.clone())
                        .with_context(|| format!("building http provider `{}`", spec.id))?,
                ),
            };
            registry = registry.with(spec.id.clone(), client);
        }
        Ok(registry)
    }

    /// Registry + validated plan, ready to share across requests.
    pub fn build_context(&self) -> Result<FeedContext> {
        let registry = self.build_registry()?;
        let plan = MixPlan::new(self.mix.clone())?;
        Ok(FeedContext::new(registry, plan, self.fetch_timeout())?)
    }
}
