// File: ./src/pipeline/health.rs
//! Per-run source health.
//!
//! A `HealthCollector` belongs to exactly one pipeline invocation and is
//! turned into an owned `RunHealth` by `finalize`.
use crate::model::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::{Display, EnumString};

pub const NOT_REACHED_MESSAGE: &str = "source was not reached during this run";
pub const NO_UPCOMING_MESSAGE: &str = "no upcoming events after filtering";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceStatus {
    Pending,
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub status: SourceStatus,
    /// Elapsed seconds.
    pub duration: f64,
    /// Raw records returned by the adapter.
    pub fetched_count: usize,
    /// Events attributed to this source in the final list.
    pub total_count: usize,
    pub error: Option<String>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            status: SourceStatus::Pending,
            duration: 0.0,
            fetched_count: 0,
            total_count: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHealth {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_events: usize,
    pub per_source: BTreeMap<String, SourceHealth>,
}

impl RunHealth {
    pub fn source(&self, name: &str) -> Option<&SourceHealth> {
        self.per_source.get(name)
    }
}

#[derive(Debug)]
pub struct HealthCollector {
    started_at: DateTime<Utc>,
    per_source: BTreeMap<String, SourceHealth>,
}

impl Default for HealthCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCollector {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            per_source: BTreeMap::new(),
        }
    }

    /// Marks a source as pending. Sources sharing a name share one entry.
    pub fn begin(&mut self, name: &str) {
        self.per_source.entry(name.to_string()).or_default();
    }

    pub fn record_ok(&mut self, name: &str, count: usize, elapsed: Duration) {
        let entry = self.per_source.entry(name.to_string()).or_default();
        if entry.status != SourceStatus::Error {
            entry.status = SourceStatus::Ok;
        }
        entry.fetched_count += count;
        entry.duration += elapsed.as_secs_f64();
    }

    pub fn record_error(&mut self, name: &str, message: &str, elapsed: Duration) {
        let entry = self.per_source.entry(name.to_string()).or_default();
        entry.status = SourceStatus::Error;
        entry.error = Some(message.to_string());
        entry.duration += elapsed.as_secs_f64();
    }

    /// Closes the run against the final event list.
    pub fn finalize(mut self, final_events: &[Event]) -> RunHealth {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for event in final_events {
            *counts.entry(event.source.as_str()).or_default() += 1;
        }

        for (name, health) in self.per_source.iter_mut() {
            health.total_count = counts.get(name.as_str()).copied().unwrap_or_default();
            match health.status {
                SourceStatus::Pending => {
                    health.status = SourceStatus::Warning;
                    health.error = Some(NOT_REACHED_MESSAGE.to_string());
                }
                SourceStatus::Ok if health.total_count == 0 => {
                    health.status = SourceStatus::Warning;
                    health.error = Some(NO_UPCOMING_MESSAGE.to_string());
                }
                _ => {}
            }
        }

        RunHealth {
            started_at: Some(self.started_at),
            finished_at: Some(Utc::now()),
            total_events: final_events.len(),
            per_source: self.per_source,
        }
    }
}
