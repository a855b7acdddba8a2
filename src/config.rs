// File: ./src/config.rs
// Handles configuration loading and defaults.
use crate::context::AppContext;
use anyhow::{Error, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

fn default_horizon_days() -> u32 {
    21
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_max_concurrent_sources() -> usize {
    4
}
fn default_source_timeout() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    15
}
fn default_detail_timeout() -> u64 {
    5
}
fn default_max_detail_fetches() -> usize {
    30
}
fn default_max_redirects() -> usize {
    5
}
fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; eventfold/{}; +https://codeberg.org/eventfold/eventfold)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_title_threshold() -> u8 {
    88
}
fn default_title_floor() -> u8 {
    75
}
fn default_description_floor() -> u8 {
    75
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_venue_aliases() -> BTreeMap<String, String> {
    [
        ("the pavilion", "sjb pavilion"),
        ("pavilion at ole miss", "sjb pavilion"),
        ("the sandy and john black pavilion at ole miss", "sjb pavilion"),
        ("vaught hemingway", "vaught hemingway stadium"),
        ("vaught hemingway stadium at hollingsworth field", "vaught hemingway stadium"),
        ("the lyric", "the lyric oxford"),
        ("lyric theatre", "the lyric oxford"),
        ("ford center", "gertrude c ford center"),
        ("the ford center", "gertrude c ford center"),
        ("proud larrys", "proud larry s"),
        ("oxford square", "the square"),
        ("downtown square", "the square"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Thresholds for the fuzzy duplicate pass, on a 0..=100 scale.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct DedupeConfig {
    #[serde(default = "default_title_threshold")]
    pub title_threshold: u8,
    #[serde(default = "default_title_floor")]
    pub title_floor: u8,
    #[serde(default = "default_description_floor")]
    pub description_floor: u8,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            title_threshold: 88,
            title_floor: 75,
            description_floor: 75,
        }
    }
}

/// A multi-purpose venue whose events are always labelled as sports.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SpecialVenue {
    pub marker: String,
    pub tag: String,
}

/// One step of the keyword cascade.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct KeywordRule {
    pub label: String,
    pub keywords: Vec<String>,
}

fn default_special_venues() -> Vec<SpecialVenue> {
    vec![SpecialVenue {
        marker: "pavilion".to_string(),
        tag: "SJB Pavilion".to_string(),
    }]
}

fn default_aggregators() -> BTreeMap<String, String> {
    [
        ("seatgeek", "SeatGeek"),
        ("ticketmaster", "Ticketmaster"),
        ("bandsintown", "Bandsintown"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_university_names() -> Vec<String> {
    words(&["ole miss", "university of mississippi", "rebels"])
}

fn default_athletics_label() -> String {
    "Ole Miss Athletics".to_string()
}

fn default_sport_keywords() -> Vec<String> {
    words(&[
        "football",
        "baseball",
        "softball",
        "basketball",
        "soccer",
        "volleyball",
        "golf",
        "tennis",
        "track",
        "swimming",
        "gymnastics",
        "cross country",
        "rifle",
        "athletics",
    ])
}

fn default_performance_venues() -> Vec<String> {
    words(&["ford center", "the lyric"])
}

fn default_keyword_rules() -> Vec<KeywordRule> {
    let rule = |label: &str, keywords: &[&str]| KeywordRule {
        label: label.to_string(),
        keywords: words(keywords),
    };
    vec![
        rule(
            "Music",
            &[
                "concert", "music", "live music", "band", "dj", "album", "singer", "acoustic",
                "jazz", "rock", "folk", "blues", "hip hop", "orchestra", "symphony", "choir",
                "recital", "karaoke",
            ],
        ),
        rule(
            "Arts & Culture",
            &[
                "art", "arts", "theatre", "theater", "play", "drama", "exhibition", "exhibit",
                "gallery", "museum", "poetry", "reading", "author", "book", "literary", "film",
                "movie", "documentary", "cinema", "screening", "sculpture", "painting", "ballet",
                "opera", "comedy",
            ],
        ),
        rule(
            "Sports",
            &[
                "football", "basketball", "baseball", "softball", "soccer", "tennis",
                "volleyball", "golf", "swimming", "tournament", "championship", "tailgate",
                "5k", "race", "match", "game",
            ],
        ),
        rule(
            "Education",
            &[
                "seminar", "workshop", "lecture", "presentation", "class", "course", "training",
                "conference", "symposium", "forum", "panel", "colloquium", "talk", "speaker",
                "bootcamp", "webinar",
            ],
        ),
        rule(
            "Religious",
            &[
                "worship", "church", "mass", "service", "bible", "prayer", "sermon", "chapel",
                "ministry", "vespers", "synagogue", "mosque",
            ],
        ),
        rule(
            "Community",
            &[
                "farmers market", "market", "festival", "fair", "community", "town hall",
                "meeting", "vendor", "craft", "volunteer", "fundraiser", "parade", "meetup",
                "trivia",
            ],
        ),
    ]
}

fn default_category_label() -> String {
    "University".to_string()
}

/// Vocabulary for the rule-based categorizer. Every rule is data so it can
/// be retargeted to another town without code changes.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CategorizerConfig {
    #[serde(default = "default_special_venues")]
    pub special_venues: Vec<SpecialVenue>,
    /// Lowercase source-name fragment -> display name.
    #[serde(default = "default_aggregators")]
    pub aggregators: BTreeMap<String, String>,
    #[serde(default = "default_university_names")]
    pub university_names: Vec<String>,
    #[serde(default = "default_athletics_label")]
    pub athletics_label: String,
    #[serde(default = "default_sport_keywords")]
    pub sport_keywords: Vec<String>,
    #[serde(default = "default_performance_venues")]
    pub performance_venues: Vec<String>,
    #[serde(default = "default_keyword_rules")]
    pub keyword_rules: Vec<KeywordRule>,
    #[serde(default = "default_category_label")]
    pub default_label: String,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            special_venues: default_special_venues(),
            aggregators: default_aggregators(),
            university_names: default_university_names(),
            athletics_label: default_athletics_label(),
            sport_keywords: default_sport_keywords(),
            performance_venues: default_performance_venues(),
            keyword_rules: default_keyword_rules(),
            default_label: default_category_label(),
        }
    }
}

/// Drops records from one source when they look like listings another
/// source already publishes. A record is excluded when its source matches,
/// its title or description contains any keyword, and its title contains
/// any marker.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ExclusionRule {
    pub source: String,
    pub keywords: Vec<String>,
    pub title_markers: Vec<String>,
}

fn default_exclusions() -> Vec<ExclusionRule> {
    vec![ExclusionRule {
        source: "Visit Oxford".to_string(),
        keywords: words(&["ole miss", "rebels", "football", "basketball", "baseball"]),
        title_markers: words(&[" vs ", " vs. ", " game", " matchup", " schedule"]),
    }]
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    /// IANA zone name used for naive timestamps and day buckets.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_max_concurrent_sources")]
    pub max_concurrent_sources: usize,
    #[serde(default = "default_source_timeout")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_detail_timeout")]
    pub detail_timeout_secs: u64,
    #[serde(default = "default_max_detail_fetches")]
    pub max_detail_fetches: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub dedupe: DedupeConfig,
    #[serde(default = "default_venue_aliases")]
    pub venue_aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub categorizer: CategorizerConfig,
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            horizon_days: 21,
            timezone: default_timezone(),
            max_concurrent_sources: 4,
            source_timeout_secs: 60,
            request_timeout_secs: 15,
            detail_timeout_secs: 5,
            max_detail_fetches: 30,
            max_redirects: 5,
            user_agent: default_user_agent(),
            dedupe: DedupeConfig::default(),
            venue_aliases: default_venue_aliases(),
            categorizer: CategorizerConfig::default(),
            exclusions: default_exclusions(),
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        Self::from_toml_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Like `load`, but a missing or broken file yields the defaults.
    pub fn load_or_default(ctx: &dyn AppContext) -> Self {
        match Self::load(ctx) {
            Ok(config) => config,
            Err(e) if Self::is_missing_config_error(&e) => {
                log::info!("No config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Detects whether an error from `load` means the file was missing.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// The zone used to interpret naive timestamps and to bucket by day.
    /// An unknown name falls back to America/Chicago.
    pub fn zone(&self) -> Tz {
        match self.timezone.trim().parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                log::warn!("Unknown timezone '{}' ({}); using {}", self.timezone, e, DEFAULT_TIMEZONE);
                Tz::America__Chicago
            }
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs.max(1))
    }
}
