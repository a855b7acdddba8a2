// File: ./src/pipeline/categorize.rs
//! Priority-ordered, rule-based event classifier.
//!
//! Rules are tried in a fixed order and the first one that fires wins:
//! special venue, aggregator source, athletics, performance venue, keyword
//! cascade, default label. All vocabularies come from `CategorizerConfig`.
use crate::config::CategorizerConfig;
use crate::text::capitalize_words;
use regex::Regex;

/// Builds `(?i)\b(?:a|b|c)\b` from a word list. An empty list never matches.
fn word_set(words: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

fn hits(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

pub struct Categorizer {
    config: CategorizerConfig,
    university: Option<Regex>,
    sports: Option<Regex>,
    performance: Option<Regex>,
    rules: Vec<(String, Option<Regex>)>,
    matchup: Regex,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(&CategorizerConfig::default())
    }
}

impl Categorizer {
    pub fn new(config: &CategorizerConfig) -> Self {
        let rules = config
            .keyword_rules
            .iter()
            .map(|rule| (rule.label.clone(), word_set(&rule.keywords)))
            .collect();

        let matchup = Regex::new(r"(?i)\s(?:vs\.?|v\.|at|@)\s").expect("static regex");

        Self {
            config: config.clone(),
            university: word_set(&config.university_names),
            sports: word_set(&config.sport_keywords),
            performance: word_set(&config.performance_venues),
            rules,
            matchup,
        }
    }

    /// Display name of the aggregator `source` belongs to, if any.
    fn aggregator(&self, source: &str) -> Option<&str> {
        let lower = source.to_lowercase();
        self.config
            .aggregators
            .iter()
            .find(|(key, _)| lower.contains(key.to_lowercase().as_str()))
            .map(|(_, display)| display.as_str())
    }

    fn special_venue(&self, text: &str, location: Option<&str>) -> Option<&str> {
        let text = text.to_lowercase();
        let location = location.unwrap_or_default().to_lowercase();
        self.config
            .special_venues
            .iter()
            .find(|v| {
                let marker = v.marker.to_lowercase();
                !marker.is_empty() && (text.contains(&marker) || location.contains(&marker))
            })
            .map(|v| v.tag.as_str())
    }

    fn is_athletics(&self, text: &str, source: &str) -> bool {
        if hits(&self.university, source) && (hits(&self.sports, source) || hits(&self.sports, text)) {
            return true;
        }
        hits(&self.university, text) && self.matchup.is_match(text) && hits(&self.sports, text)
    }

    pub fn categorize(
        &self,
        title: &str,
        description: &str,
        source: &str,
        location: Option<&str>,
    ) -> String {
        let text = format!(" {} {} ", title, description);
        let aggregator = self.aggregator(source);

        if let Some(tag) = self.special_venue(&text, location) {
            return match aggregator {
                Some(_) => format!("{}, Sports, {}", tag, capitalize_words(source)),
                None => format!("{}, Sports", tag),
            };
        }

        if let Some(display) = aggregator {
            return display.to_string();
        }

        if self.is_athletics(&text, source) {
            return self.config.athletics_label.clone();
        }

        if hits(&self.performance, &text) {
            return "Performance".to_string();
        }

        for (label, re) in &self.rules {
            if hits(re, &text) {
                return label.clone();
            }
        }

        self.config.default_label.clone()
    }
}
