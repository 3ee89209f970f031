// tests/feed_scenarios.rs
//
// Engine-level behaviour of the dispatcher: ordering, fallback, prefix
// truncation and the window/offset laws, without the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use content_mixer::provider::sample::{FailingProvider, SampleProvider};
use content_mixer::{
    dispatch, ContentClient, ContentItem, FeedContext, MixPlan, ProviderRegistry, Slot, Window,
};

fn item(source: &str, seq: usize) -> ContentItem {
    ContentItem {
        id: format!("{source}-{seq}"),
        title: format!("item {seq}"),
        source: source.to_string(),
        summary: String::new(),
        link: String::new(),
        expiry: Utc::now(),
    }
}

/// Records every call and answers after a delay that shrinks with each call,
/// so later positions tend to finish first.
struct RecordingProvider {
    source: &'static str,
    calls: Mutex<Vec<(String, usize)>>,
}

impl RecordingProvider {
    fn new(source: &'static str) -> Self {
        Self {
            source,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentClient for RecordingProvider {
    async fn fetch(&self, requester: &str, count: usize) -> Result<Vec<ContentItem>> {
        let seq = {
            let mut calls = self.calls.lock();
            calls.push((requester.to_string(), count));
            calls.len()
        };
        tokio::time::sleep(Duration::from_millis(200u64.saturating_sub(seq as u64 * 10))).await;
        Ok((0..count).map(|i| item(self.source, seq + i)).collect())
    }
}

/// Succeeds with an empty list, violating the one-item contract.
struct EmptyProvider;

#[async_trait]
impl ContentClient for EmptyProvider {
    async fn fetch(&self, _requester: &str, _count: usize) -> Result<Vec<ContentItem>> {
        Ok(Vec::new())
    }
}

/// Fails on the listed call numbers (1-based), succeeds otherwise.
struct FlakyProvider {
    source: &'static str,
    fail_on: Vec<usize>,
    calls: Mutex<usize>,
}

#[async_trait]
impl ContentClient for FlakyProvider {
    async fn fetch(&self, _requester: &str, count: usize) -> Result<Vec<ContentItem>> {
        let n = {
            let mut c = self.calls.lock();
            *c += 1;
            *c
        };
        if self.fail_on.contains(&n) {
            bail!("flaky failure on call {n}");
        }
        Ok((0..count).map(|i| item(self.source, n + i)).collect())
    }
}

fn registry() -> ProviderRegistry {
    ProviderRegistry::new()
        .with("1", Arc::new(SampleProvider::new("1")))
        .with("2", Arc::new(SampleProvider::new("2")))
        .with("3", Arc::new(SampleProvider::new("3")))
        .with("4", Arc::new(FailingProvider::new("4")))
}

fn ctx(slots: Vec<Slot>) -> Arc<FeedContext> {
    Arc::new(
        FeedContext::new(
            registry(),
            MixPlan::new(slots).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap(),
    )
}

async fn sources(ctx: &Arc<FeedContext>, offset: u64, count: usize) -> Vec<String> {
    dispatch(Arc::clone(ctx), Window::new(offset, count), Arc::from("tester"))
        .await
        .into_iter()
        .map(|i| i.source)
        .collect()
}

fn default_like_plan() -> Vec<Slot> {
    vec![
        Slot::new("1").with_fallback("2"),
        Slot::new("1").with_fallback("2"),
        Slot::new("2").with_fallback("3"),
        Slot::new("3").with_fallback("1"),
        Slot::new("1"),
    ]
}

#[tokio::test]
async fn fallback_fills_failed_primary() {
    let c = ctx(vec![
        Slot::new("1").with_fallback("2"),
        Slot::new("2"),
        Slot::new("4").with_fallback("3"),
    ]);
    assert_eq!(sources(&c, 0, 5).await, vec!["1", "2", "3", "1", "2"]);
}

#[tokio::test]
async fn failure_without_fallback_truncates_after_offset() {
    let c = ctx(vec![
        Slot::new("1").with_fallback("2"),
        Slot::new("4"),
        Slot::new("4").with_fallback("3"),
    ]);
    assert_eq!(sources(&c, 5, 5).await, vec!["3", "1"]);
}

#[tokio::test]
async fn wrapped_first_position_failing_yields_empty() {
    let c = ctx(vec![
        Slot::new("1").with_fallback("2"),
        Slot::new("2"),
        Slot::new("4").with_fallback("3"),
        Slot::new("4").with_fallback("4"),
    ]);
    assert!(sources(&c, 7, 5).await.is_empty());
}

#[tokio::test]
async fn no_failures_follow_plan_primaries() {
    let plan = default_like_plan();
    let c = ctx(plan.clone());
    for offset in [0u64, 3, 5, 12, 1_000_003] {
        let got = sources(&c, offset, 9).await;
        assert_eq!(got.len(), 9);
        for (j, s) in got.iter().enumerate() {
            let slot = &plan[((offset + j as u64) % plan.len() as u64) as usize];
            assert_eq!(s, slot.primary.as_str(), "offset {offset}, j {j}");
        }
    }
}

#[tokio::test]
async fn result_never_exceeds_count() {
    let c = ctx(vec![Slot::new("1"), Slot::new("4").with_fallback("2")]);
    for count in [0usize, 1, 2, 7, 33] {
        assert!(sources(&c, 1, count).await.len() <= count);
    }
}

#[tokio::test]
async fn window_concatenation_law() {
    let c = ctx(default_like_plan());
    let whole = sources(&c, 0, 10).await;
    let mut parts = sources(&c, 0, 5).await;
    parts.extend(sources(&c, 5, 5).await);
    assert_eq!(whole, parts);
}

#[tokio::test]
async fn offset_wraps_modulo_plan_length() {
    let plan = vec![
        Slot::new("1"),
        Slot::new("4").with_fallback("3"),
        Slot::new("2"),
        Slot::new("4"),
    ];
    let c = ctx(plan);
    for o in 0..4u64 {
        let base = sources(&c, o, 6).await;
        assert_eq!(sources(&c, o + 4, 6).await, base);
        assert_eq!(sources(&c, o + 400, 6).await, base);
    }
    // Offset exactly equal to the plan length behaves like offset 0.
    assert_eq!(sources(&c, 4, 3).await, sources(&c, 0, 3).await);
}

#[tokio::test]
async fn single_failed_call_cuts_result_before_its_position() {
    // One call out of six fails; whichever position it lands on, the result
    // stops right before it.
    let flaky = Arc::new(FlakyProvider {
        source: "f",
        fail_on: vec![3],
        calls: Mutex::new(0),
    });
    let reg = ProviderRegistry::new().with("f", flaky);
    let c = Arc::new(
        FeedContext::new(
            reg,
            MixPlan::new(vec![Slot::new("f")]).unwrap(),
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let out = dispatch(c, Window::new(0, 6), Arc::from("tester")).await;
    assert!(out.len() <= 6);
    // Exactly one call fails, so exactly one position is missing.
    assert!(out.len() < 6);
    assert!(out.iter().all(|i| i.source == "f"));
}

#[tokio::test]
async fn empty_success_counts_as_failure() {
    let reg = registry().with("e", Arc::new(EmptyProvider));
    let plan = MixPlan::new(vec![
        Slot::new("1"),
        Slot::new("e").with_fallback("3"),
        Slot::new("e"),
        Slot::new("2"),
    ])
    .unwrap();
    let c = Arc::new(FeedContext::new(reg, plan, Duration::from_secs(2)).unwrap());
    assert_eq!(sources(&c, 0, 4).await, vec!["1", "3"]);
}

#[tokio::test(start_paused = true)]
async fn order_is_positional_when_later_tasks_finish_first() {
    let reg = ProviderRegistry::new()
        .with(
            "a",
            Arc::new(SampleProvider::new("a").with_latency(Duration::from_millis(300))),
        )
        .with(
            "b",
            Arc::new(SampleProvider::new("b").with_latency(Duration::from_millis(200))),
        )
        .with(
            "c",
            Arc::new(SampleProvider::new("c").with_latency(Duration::from_millis(100))),
        );
    let plan = MixPlan::new(vec![Slot::new("a"), Slot::new("b"), Slot::new("c")]).unwrap();
    let c = Arc::new(FeedContext::new(reg, plan, Duration::from_secs(5)).unwrap());
    assert_eq!(sources(&c, 0, 6).await, vec!["a", "b", "c", "a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn every_call_asks_for_one_item_on_behalf_of_requester() {
    let rec = Arc::new(RecordingProvider::new("r"));
    let reg = ProviderRegistry::new().with("r", rec.clone());
    let c = Arc::new(
        FeedContext::new(
            reg,
            MixPlan::new(vec![Slot::new("r")]).unwrap(),
            Duration::from_secs(5),
        )
        .unwrap(),
    );

    let out = dispatch(c, Window::new(0, 8), Arc::from("10.1.2.3")).await;
    assert_eq!(out.len(), 8);

    let calls = rec.calls.lock();
    assert_eq!(calls.len(), 8);
    assert!(calls.iter().all(|(req, n)| req == "10.1.2.3" && *n == 1));
}

#[tokio::test(start_paused = true)]
async fn slow_primary_times_out_into_fallback() {
    let reg = registry().with(
        "slow",
        Arc::new(SampleProvider::new("slow").with_latency(Duration::from_secs(30))),
    );
    let plan = MixPlan::new(vec![
        Slot::new("1"),
        Slot::new("slow").with_fallback("2"),
        Slot::new("slow"),
        Slot::new("3"),
    ])
    .unwrap();
    let c = Arc::new(FeedContext::new(reg, plan, Duration::from_millis(100)).unwrap());
    assert_eq!(sources(&c, 0, 4).await, vec!["1", "2"]);
}
