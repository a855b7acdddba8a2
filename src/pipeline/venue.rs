// File: ./src/pipeline/venue.rs
//! Venue canonicalization, used only to build duplicate-matching keys.
use std::collections::BTreeMap;

/// Lowercases, turns every non-alphanumeric run into one space and trims.
pub fn normalize_venue(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read-only alias table built once per run.
#[derive(Debug, Clone, Default)]
pub struct VenueResolver {
    aliases: BTreeMap<String, String>,
}

impl VenueResolver {
    /// Both sides of every entry are normalized, so configuration may use
    /// any spelling.
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let aliases = aliases
            .iter()
            .map(|(alias, canonical)| (normalize_venue(alias), normalize_venue(canonical)))
            .filter(|(alias, _)| !alias.is_empty())
            .collect();
        Self { aliases }
    }

    pub fn canonical(&self, text: &str) -> String {
        let normalized = normalize_venue(text);
        match self.aliases.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
