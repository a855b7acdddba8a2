// File: tests/pipeline_runs.rs
use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset};
use eventfold::config::Config;
use eventfold::context::TestContext;
use eventfold::fetch::{Adapter, AdapterRegistry, FetchContext};
use eventfold::model::{RawRecord, Source, SourceKind};
use eventfold::pipeline::health::{NO_UPCOMING_MESSAGE, SourceStatus};
use eventfold::pipeline::{NoProgress, Pipeline};
use eventfold::registry::SourceRegistry;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Listing {
    records: Vec<RawRecord>,
    delay: Duration,
}

impl Adapter for Listing {
    fn fetch<'a>(&'a self, _source: &'a Source, _ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(self.records.clone())
        })
    }
}

struct Failing;

impl Adapter for Failing {
    fn fetch<'a>(&'a self, source: &'a Source, _ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move { Err(anyhow!("boom: {} refused the connection", source.name)) })
    }
}

fn record(title: &str, start: &str) -> RawRecord {
    RawRecord {
        title: Some(title.to_string()),
        start: Some(start.to_string()),
        ..Default::default()
    }
}

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-03-01T00:00:00-06:00").unwrap()
}

fn config() -> Config {
    Config {
        timezone: "America/Chicago".to_string(),
        ..Config::default()
    }
}

fn listing(records: Vec<RawRecord>, delay_ms: u64) -> Arc<dyn Adapter> {
    Arc::new(Listing {
        records,
        delay: Duration::from_millis(delay_ms),
    })
}

/// Five api sources, each resolved through its own parser tag.
fn five_sources() -> (Vec<Source>, AdapterRegistry) {
    let mut registry = AdapterRegistry::empty();
    registry.register(
        SourceKind::Api,
        "s1",
        listing(vec![record("Trivia Night", "2025-03-02T19:00:00-06:00")], 60),
    );
    registry.register(
        SourceKind::Api,
        "s2",
        listing(vec![record("Jazz Quartet", "2025-03-03T20:00:00")], 0),
    );
    registry.register(SourceKind::Api, "s3", Arc::new(Failing));
    registry.register(
        SourceKind::Api,
        "s4",
        listing(vec![record("Pottery Workshop", "March 4, 2025 10:00 AM")], 20),
    );
    registry.register(
        SourceKind::Api,
        "s5",
        listing(vec![record("Gospel Choir", "2025-03-05")], 5),
    );

    let sources = (1..=5)
        .map(|i| Source::new(&format!("S{}", i), SourceKind::Api).with_parser(&format!("s{}", i)))
        .collect();
    (sources, registry)
}

#[tokio::test]
async fn test_failing_source_is_isolated() {
    let (sources, registry) = five_sources();
    let pipeline = Pipeline::new(config()).with_registry(registry);

    let seen = Mutex::new(Vec::new());
    let observer = |name: &str, index: usize, total: usize| {
        seen.lock().unwrap().push((name.to_string(), index, total));
    };
    let outcome = pipeline.run_at(&sources, &observer, now()).await;

    let names: Vec<&str> = outcome.events.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(names, vec!["S1", "S2", "S4", "S5"]);
    assert_eq!(outcome.raw_count, 5, "four records plus one error placeholder");

    let failed = outcome.health.source("S3").unwrap();
    assert_eq!(failed.status, SourceStatus::Error);
    assert!(failed.error.as_deref().unwrap().contains("boom"));
    for name in ["S1", "S2", "S4", "S5"] {
        let h = outcome.health.source(name).unwrap();
        assert_eq!(h.status, SourceStatus::Ok, "{}", name);
        assert_eq!(h.fetched_count, 1);
        assert_eq!(h.total_count, 1);
    }
    assert_eq!(outcome.health.total_events, 4);

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 5);
    assert_eq!(
        seen.iter().map(|(_, i, t)| (*i, *t)).collect::<Vec<_>>(),
        vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]
    );
}

#[tokio::test]
async fn test_identical_inputs_give_identical_json() {
    let mut outputs = Vec::new();
    for _ in 0..3 {
        let (sources, registry) = five_sources();
        let pipeline = Pipeline::new(config()).with_registry(registry);
        let outcome = pipeline.run_at(&sources, &NoProgress, now()).await;
        outputs.push(serde_json::to_string(&outcome.events).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let mut registry = AdapterRegistry::empty();
    registry.set_fallback(
        SourceKind::Feed,
        listing(vec![record("Never Seen", "2025-03-02T19:00:00-06:00")], 5_000),
    );
    let config = Config {
        source_timeout_secs: 1,
        ..config()
    };
    let sources = vec![Source::new("Sluggish", SourceKind::Feed)];
    let outcome = Pipeline::new(config)
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;

    assert!(outcome.events.is_empty());
    let h = outcome.health.source("Sluggish").unwrap();
    assert_eq!(h.status, SourceStatus::Error);
    assert!(h.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_missing_registry_gives_empty_run() {
    let ctx = TestContext::new();
    let sources = SourceRegistry::load(&ctx);
    assert!(sources.is_empty());

    let outcome = Pipeline::new(config()).run_at(&sources, &NoProgress, now()).await;
    assert!(outcome.events.is_empty());
    assert!(outcome.health.per_source.is_empty());
    assert_eq!(outcome.health.total_events, 0);
    assert_eq!(outcome.raw_count, 0);
}

#[tokio::test]
async fn test_cross_source_duplicates_and_window() {
    let mut registry = AdapterRegistry::empty();
    registry.register(
        SourceKind::Api,
        "first",
        listing(
            vec![
                record("Oxford Farmers Market", "2025-03-01T08:00:00-06:00"),
                // a minute before the window opens
                record("Sunrise Yoga", "2025-02-28T23:59:00-06:00"),
                record("Undated Mystery", "sometime soon"),
            ],
            0,
        ),
    );
    let mut richer = record("Oxford Farmer's Market \u{2014} Weekly", "2025-03-01T09:00:00-06:00");
    richer.location = Some("Oxford Square".to_string());
    richer.cost = Some("Free".to_string());
    registry.register(SourceKind::Api, "second", listing(vec![richer], 0));

    let sources = vec![
        Source::new("First", SourceKind::Api).with_parser("first"),
        Source::new("Second", SourceKind::Api).with_parser("second"),
    ];
    let outcome = Pipeline::new(config())
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;

    assert_eq!(outcome.events.len(), 1);
    let market = &outcome.events[0];
    assert_eq!(market.title, "Oxford Farmers Market");
    assert_eq!(market.source, "First");
    assert_eq!(market.location.as_deref(), Some("Oxford Square"));
    assert_eq!(market.cost.as_deref(), Some("Free"));
    assert_eq!(market.start_iso.as_deref(), Some("2025-03-01T08:00:00-06:00"));

    // the merged source kept nothing of its own
    let second = outcome.health.source("Second").unwrap();
    assert_eq!(second.status, SourceStatus::Warning);
    assert_eq!(second.error.as_deref(), Some(NO_UPCOMING_MESSAGE));
    assert_eq!(outcome.health.source("First").unwrap().fetched_count, 3);
}

#[tokio::test]
async fn test_categorizer_runs_during_normalization() {
    let mut registry = AdapterRegistry::empty();
    let mut tagged = record("Gallery opening", "2025-03-03T18:00:00-06:00");
    tagged.category = Some("Exhibit".to_string());
    registry.set_fallback(
        SourceKind::Feed,
        listing(
            vec![
                record("Jazz concert at The Pavilion", "2025-03-02T19:00:00-06:00"),
                tagged,
            ],
            0,
        ),
    );
    let sources = vec![Source::new("Campus Calendar", SourceKind::Feed)];
    let outcome = Pipeline::new(config())
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;

    let categories: Vec<&str> = outcome
        .events
        .iter()
        .filter_map(|e| e.category.as_deref())
        .collect();
    assert_eq!(categories, vec!["SJB Pavilion, Sports", "Exhibit"]);
}

#[tokio::test]
async fn test_exclusion_rule_drops_republished_athletics() {
    let mut registry = AdapterRegistry::empty();
    registry.set_fallback(
        SourceKind::Page,
        listing(
            vec![
                record("Ole Miss vs. LSU basketball game", "2025-03-02T19:00:00-06:00"),
                record("Double Decker Arts Festival", "2025-03-03T10:00:00-06:00"),
            ],
            0,
        ),
    );
    let sources = vec![Source::new("Visit Oxford", SourceKind::Page)];
    let outcome = Pipeline::new(config())
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;

    assert_eq!(outcome.raw_count, 2);
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].title, "Double Decker Arts Festival");
}

#[tokio::test]
async fn test_unbounded_horizon_does_not_panic() {
    let (sources, registry) = five_sources();
    let config = Config {
        horizon_days: u32::MAX,
        ..config()
    };
    let outcome = Pipeline::new(config)
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;
    assert_eq!(outcome.events.len(), 4);
}

#[tokio::test]
async fn test_summer_listing_uses_daylight_offset() {
    let mut registry = AdapterRegistry::empty();
    registry.set_fallback(
        SourceKind::Feed,
        listing(vec![record("Fourth of July Fireworks", "2025-07-04 21:00")], 0),
    );
    let config = Config {
        horizon_days: 180,
        ..config()
    };
    let sources = vec![Source::new("Town Feed", SourceKind::Feed)];
    let outcome = Pipeline::new(config)
        .with_registry(registry)
        .run_at(&sources, &NoProgress, now())
        .await;

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].start_iso.as_deref(), Some("2025-07-04T21:00:00-05:00"));
}
