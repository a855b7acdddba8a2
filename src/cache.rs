// File: ./src/cache.rs
// Snapshot of the last completed run, read back by `--cached`.
//
// Bump CACHE_VERSION whenever Event, RunHealth or RunOutcome change shape so
// stale snapshots are ignored instead of half-parsed.
use crate::context::AppContext;
use crate::pipeline::RunOutcome;
use crate::storage::FileStore;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct RunSnapshot {
    #[serde(default)]
    version: u32,
    outcome: RunOutcome,
}

pub struct RunCache;

impl RunCache {
    pub fn save(ctx: &dyn AppContext, outcome: &RunOutcome) -> Result<()> {
        let path = ctx
            .get_last_run_path()
            .ok_or_else(|| anyhow!("No cache directory available"))?;
        FileStore::with_lock(&path, || {
            let data = RunSnapshot {
                version: CACHE_VERSION,
                outcome: outcome.clone(),
            };
            let json = serde_json::to_string_pretty(&data)?;
            FileStore::atomic_write(&path, json)?;
            Ok(())
        })
    }

    /// The last saved run, or `None` when there is none or it was written
    /// by an incompatible version.
    pub fn load(ctx: &dyn AppContext) -> Option<RunOutcome> {
        let path = ctx.get_last_run_path()?;
        if !path.exists() {
            return None;
        }
        let loaded = FileStore::with_lock(&path, || {
            let json = fs::read_to_string(&path)?;
            Ok(serde_json::from_str::<RunSnapshot>(&json).ok())
        });
        match loaded {
            Ok(Some(snapshot)) if snapshot.version == CACHE_VERSION => Some(snapshot.outcome),
            Ok(Some(snapshot)) => {
                log::info!(
                    "Ignoring cached run from version {} (expected {})",
                    snapshot.version,
                    CACHE_VERSION
                );
                None
            }
            Ok(None) => {
                log::warn!("Cached run at {} is unreadable", path.display());
                None
            }
            Err(e) => {
                log::warn!("Failed to read cached run: {:#}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use crate::model::Event;

    fn outcome() -> RunOutcome {
        let mut event = Event::new("Trivia", "Pub Feed");
        event.start_iso = Some("2025-03-01T19:00:00-06:00".to_string());
        event.end_iso = event.start_iso.clone();
        RunOutcome {
            events: vec![event],
            raw_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_save_then_load() {
        let ctx = TestContext::new();
        assert!(RunCache::load(&ctx).is_none());
        RunCache::save(&ctx, &outcome()).unwrap();
        assert_eq!(RunCache::load(&ctx), Some(outcome()));
    }

    #[test]
    fn test_version_mismatch_is_ignored() {
        let ctx = TestContext::new();
        let path = ctx.get_last_run_path().unwrap();
        let stale = serde_json::json!({ "version": CACHE_VERSION + 1, "outcome": outcome() });
        fs::write(&path, stale.to_string()).unwrap();
        assert!(RunCache::load(&ctx).is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(RunCache::load(&ctx).is_none());
    }
}
