// File: ./src/pipeline/mod.rs
//! The run driver: fetch every source, normalize, dedupe, window.
//!
//! `Pipeline::run` never fails. A source that errors or times out is turned
//! into one placeholder record and an `error` health entry; everything else
//! carries on.
pub mod categorize;
pub mod dedupe;
pub mod health;
pub mod normalize;
pub mod similarity;
pub mod venue;
pub mod window;

use crate::config::Config;
use crate::fetch::{AdapterRegistry, FetchContext};
use crate::model::{Event, RawRecord, Source};
use crate::pipeline::categorize::Categorizer;
use crate::pipeline::dedupe::Deduplicator;
use crate::pipeline::health::{HealthCollector, RunHealth};
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::venue::VenueResolver;
use crate::pipeline::window::filter_window;
use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Side channel notified as each source finishes fetching. `index` counts
/// completed sources from 1 and is not the declared position.
pub trait ProgressObserver: Sync {
    fn on_source(&self, _name: &str, _index: usize, _total: usize) {}
}

/// Observer that ignores every notification.
pub struct NoProgress;

impl ProgressObserver for NoProgress {}

impl<F> ProgressObserver for F
where
    F: Fn(&str, usize, usize) + Sync,
{
    fn on_source(&self, name: &str, index: usize, total: usize) {
        self(name, index, total)
    }
}

/// Everything one invocation produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub events: Vec<Event>,
    pub health: RunHealth,
    /// Records returned by adapters, placeholders included, before any
    /// exclusion or dedupe.
    pub raw_count: usize,
}

type FetchResult = (usize, Result<Vec<RawRecord>>, Duration);

pub struct Pipeline {
    config: Config,
    registry: AdapterRegistry,
    fetch_ctx: std::result::Result<FetchContext, String>,
}

impl Pipeline {
    /// Builds the default adapters and HTTP client from `config`. A client
    /// that cannot be built is not fatal here: every source then reports it.
    pub fn new(config: Config) -> Self {
        let fetch_ctx = FetchContext::from_config(&config).map_err(|e| {
            log::error!("Failed to build HTTP client: {:#}", e);
            format!("{:#}", e)
        });
        Self {
            config,
            registry: AdapterRegistry::with_defaults(),
            fetch_ctx,
        }
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_fetch_context(mut self, ctx: FetchContext) -> Self {
        self.fetch_ctx = Ok(ctx);
        self
    }

    pub async fn run(&self, sources: &[Source], observer: &dyn ProgressObserver) -> RunOutcome {
        let now = Utc::now().with_timezone(&self.config.zone()).fixed_offset();
        self.run_at(sources, observer, now).await
    }

    /// Same as `run` with an explicit "now" for the window stage.
    pub async fn run_at(
        &self,
        sources: &[Source],
        observer: &dyn ProgressObserver,
        now: DateTime<FixedOffset>,
    ) -> RunOutcome {
        let mut health = HealthCollector::new();
        for source in sources {
            health.begin(&source.name);
        }
        if sources.is_empty() {
            log::info!("No sources configured");
            return RunOutcome {
                health: health.finalize(&[]),
                ..Default::default()
            };
        }

        log::info!(
            "Fetching {} sources ({} at a time)",
            sources.len(),
            self.config.max_concurrent_sources.max(1)
        );
        let mut results = self.fetch_all(sources, observer).await;
        results.sort_by_key(|(idx, _, _)| *idx);

        let zone = self.config.zone();
        let categorizer = Categorizer::new(&self.config.categorizer);
        let normalizer = Normalizer::new(zone, Some(&categorizer));
        let mut raw_count = 0;
        let mut events = Vec::new();

        for (idx, result, elapsed) in results {
            let source = &sources[idx];
            let records = match result {
                Ok(records) => {
                    log::debug!("{}: {} records in {:.2?}", source.name, records.len(), elapsed);
                    health.record_ok(&source.name, records.len(), elapsed);
                    records
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    log::warn!("{}: {}", source.name, message);
                    health.record_error(&source.name, &message, elapsed);
                    vec![RawRecord::source_error(&source.name, &message)]
                }
            };
            raw_count += records.len();

            for raw in records {
                if let Some(rule) = self
                    .config
                    .exclusions
                    .iter()
                    .find(|r| r.matches(&source.name, &raw))
                {
                    log::debug!(
                        "Excluded '{}' from {} (rule for {})",
                        raw.title.as_deref().unwrap_or_default(),
                        source.name,
                        rule.source
                    );
                    continue;
                }
                events.push(normalizer.normalize(raw, &source.name, source.group.as_deref()));
            }
        }

        let venues = VenueResolver::new(&self.config.venue_aliases);
        let deduped = Deduplicator::new(&venues, &self.config.dedupe, zone).dedupe(events);
        let events = filter_window(deduped, now, self.config.horizon_days);
        log::info!("{} raw records, {} upcoming events", raw_count, events.len());

        RunOutcome {
            health: health.finalize(&events),
            events,
            raw_count,
        }
    }

    async fn fetch_all(&self, sources: &[Source], observer: &dyn ProgressObserver) -> Vec<FetchResult> {
        let total = sources.len();
        let futures = sources.iter().enumerate().map(|(idx, source)| async move {
            let started = Instant::now();
            let result = self.fetch_one(source).await;
            (idx, result, started.elapsed())
        });

        let mut stream = stream::iter(futures).buffer_unordered(self.config.max_concurrent_sources.max(1));
        let mut results = Vec::with_capacity(total);
        while let Some(item) = stream.next().await {
            observer.on_source(&sources[item.0].name, results.len() + 1, total);
            results.push(item);
        }
        results
    }

    async fn fetch_one(&self, source: &Source) -> Result<Vec<RawRecord>> {
        let ctx = self
            .fetch_ctx
            .as_ref()
            .map_err(|e| anyhow!("HTTP client unavailable: {}", e))?;
        let adapter = self
            .registry
            .resolve(source)
            .ok_or_else(|| anyhow!("No adapter registered for {} sources", source.kind))?;

        let limit = self.config.source_timeout();
        match tokio::time::timeout(limit, adapter.fetch(source, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("Source timed out after {}s", limit.as_secs())),
        }
    }
}
