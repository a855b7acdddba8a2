// File: ./src/model/source.rs
use http::Uri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

fn default_true() -> bool {
    true
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceKind {
    Feed,
    Calendar,
    Page,
    Api,
}

/// One declared origin of event listings. Loaded from `sources.toml` and
/// never mutated while a run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Kind-specific parameters such as `city` or `api_key_env`.
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl Source {
    pub fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            endpoint: None,
            parser: None,
            group: None,
            enabled: true,
            params: BTreeMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_parser(mut self, parser: &str) -> Self {
        self.parser = Some(parser.to_string());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Parser tag, lowercased, or an empty string when none was declared.
    pub fn parser_tag(&self) -> String {
        self.parser
            .as_deref()
            .map(|p| p.trim().to_lowercase())
            .unwrap_or_default()
    }

    /// Lowercased host of the endpoint, without a leading `www.`.
    pub fn endpoint_host(&self) -> Option<String> {
        let uri: Uri = self.endpoint.as_deref()?.trim().parse().ok()?;
        let host = uri.host()?.to_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
}
