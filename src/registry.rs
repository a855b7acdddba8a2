// File: ./src/registry.rs
//! The declared list of sources, read from `sources.toml`.
use crate::context::AppContext;
use crate::model::Source;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<Source>,
}

pub struct SourceRegistry;

impl SourceRegistry {
    /// Enabled sources in declared order. A missing or unreadable file
    /// yields an empty list; the run then produces nothing.
    pub fn load(ctx: &dyn AppContext) -> Vec<Source> {
        let path = match ctx.get_sources_file_path() {
            Ok(p) => p,
            Err(e) => {
                log::error!("Cannot locate sources file: {:#}", e);
                return Vec::new();
            }
        };
        if !path.exists() {
            log::info!("No sources file at {}", path.display());
            return Vec::new();
        }

        let parsed = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sources file '{}'", path.display()))
            .and_then(|contents| {
                Self::from_toml_str(&contents)
                    .with_context(|| format!("Failed to parse sources file '{}'", path.display()))
            });
        match parsed {
            Ok(sources) => sources,
            Err(e) => {
                log::error!("{:#}", e);
                Vec::new()
            }
        }
    }

    /// Parses a `[[sources]]` array, dropping disabled entries.
    pub fn from_toml_str(contents: &str) -> Result<Vec<Source>> {
        let file: SourcesFile = toml::from_str(contents)?;
        let total = file.sources.len();
        let sources: Vec<Source> = file.sources.into_iter().filter(|s| s.enabled).collect();
        if sources.len() < total {
            log::debug!("Skipping {} disabled sources", total - sources.len());
        }
        Ok(sources)
    }
}
