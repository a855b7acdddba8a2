// File: ./src/model/event.rs
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The canonical, source-independent event record.
///
/// The field set is closed: rendering and export code downstream relies on
/// exactly these keys in the JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start_iso: Option<String>,
    pub end_iso: Option<String>,
    pub location: Option<String>,
    pub cost: Option<String>,
    pub link: Option<String>,
    pub source: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
}

impl Event {
    /// Minimal event with only the required fields set.
    pub fn new(title: &str, source: &str) -> Self {
        Self {
            title: title.to_string(),
            start_iso: None,
            end_iso: None,
            location: None,
            cost: None,
            link: None,
            source: source.to_string(),
            category: None,
            description: None,
            group: None,
        }
    }

    /// Parses `start_iso` back into an offset-aware timestamp.
    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.start_iso
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    pub fn has_location(&self) -> bool {
        is_present(&self.location)
    }
}

/// True when the optional text field holds something other than whitespace.
pub fn is_present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// A loosely-typed record as extracted by a fetch adapter, before any
/// coercion. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub cost: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

impl RawRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// The single placeholder record emitted in place of a failed source.
    pub fn source_error(source_name: &str, message: &str) -> Self {
        Self {
            title: Some(format!("[{}] (source error)", source_name)),
            description: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Text used by keyword based rules: title and description joined.
    pub fn search_text(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        )
    }
}
