// File: ./src/pipeline/normalize.rs
//! Raw adapter output -> canonical `Event`.
//!
//! Coercion never fails: a field that cannot be understood becomes `None`
//! and the record is still emitted, so the window stage (not this one)
//! decides what is dropped.
use crate::config::ExclusionRule;
use crate::model::{Event, RawRecord};
use crate::pipeline::categorize::Categorizer;
use crate::text::{clean, collapse_whitespace, strip_html};
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::OnceLock;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

const AWARE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
];

const HUMAN_DATETIME_FORMATS: &[&str] = &[
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I %p",
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %I %p",
    "%B %d %Y %I:%M %p",
    "%B %d %Y %I %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I %p",
    "%m/%d/%Y %H:%M",
    "%d %B %Y %H:%M",
];

fn weekday_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(mon|tue|tues|wed|thu|thur|thurs|fri|sat|sun)[a-z]*\.?,?\s+")
            .expect("static regex")
    })
}

fn ordinal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("static regex"))
}

fn meridiem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d)\s*([ap])\.?\s?m\.?(\s|$)").expect("static regex"))
}

fn range_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+(?:-|\x{2013}|\x{2014}|to)\s+").expect("static regex"))
}

fn trailing_zone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+(?:[ECMP][SD]T|CT|ET|UTC|GMT)$").expect("static regex"))
}

/// Interprets a loosely formatted date/time string.
///
/// Values carrying their own offset keep their instant; naive values are
/// placed in `zone` at the offset in force on that date. The result is
/// always expressed in `zone`. A wall time skipped by a DST jump has no
/// instant and yields `None`; a repeated one takes the earlier instant.
pub fn coerce_datetime(raw: &str, zone: Tz) -> Option<DateTime<FixedOffset>> {
    let s = collapse_whitespace(raw);
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&zone).fixed_offset());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&s) {
        return Some(dt.with_timezone(&zone).fixed_offset());
    }
    // iCalendar UTC form, e.g. 20250301T190000Z
    if let Some(stripped) = s.strip_suffix('Z')
        && let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
    {
        return Some(Utc.from_utc_datetime(&naive).with_timezone(&zone).fixed_offset());
    }
    for fmt in AWARE_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&zone).fixed_offset());
        }
    }
    if let Some(naive) = parse_naive(&s) {
        return in_zone(zone, &naive);
    }

    let human = humanize(&s);
    if human != s
        && let Some(naive) = parse_naive(&human)
    {
        return in_zone(zone, &naive);
    }
    None
}

fn in_zone(zone: Tz, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    zone.from_local_datetime(naive).earliest().map(|dt| dt.fixed_offset())
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for fmt in NAIVE_DATETIME_FORMATS.iter().chain(HUMAN_DATETIME_FORMATS) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Rewrites listing-page phrasing ("Saturday, March 1st, 2025 at 7pm - 9pm CST")
/// into something the fixed formats accept.
fn humanize(s: &str) -> String {
    let mut out = weekday_prefix_re().replace(s, "").into_owned();
    if let Some(first) = range_split_re().split(&out).next() {
        out = first.to_string();
    }
    out = trailing_zone_re().replace(&out, "").into_owned();
    out = ordinal_re().replace_all(&out, "$1").into_owned();
    out = out.replace(" at ", " ").replace(" @ ", " ");
    out = meridiem_re()
        .replace_all(&out, |caps: &regex::Captures| {
            format!("{} {}M{}", &caps[1], caps[2].to_uppercase(), &caps[3])
        })
        .into_owned();
    collapse_whitespace(&out)
}

/// RFC 3339 rendering used for `start_iso`/`end_iso`.
pub fn to_iso(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Substring map used when no full categorizer is supplied.
const FALLBACK_CATEGORIES: &[(&str, &str)] = &[
    ("concert", "Music"),
    ("music", "Music"),
    ("jazz", "Music"),
    ("festival", "Festivals"),
    ("parade", "Festivals"),
    ("theatre", "Performing Arts"),
    ("theater", "Performing Arts"),
    ("lecture", "Talks & Lectures"),
    ("seminar", "Talks & Lectures"),
    ("film", "Film"),
    ("screening", "Film"),
    ("market", "Markets & Fairs"),
    ("football", "Sports"),
    ("basketball", "Sports"),
    ("baseball", "Sports"),
];

pub fn fallback_category(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    FALLBACK_CATEGORIES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, label)| label.to_string())
}

impl ExclusionRule {
    /// True when `raw`, fetched from `source_name`, should be skipped.
    pub fn matches(&self, source_name: &str, raw: &RawRecord) -> bool {
        if !self.source.eq_ignore_ascii_case(source_name.trim()) {
            return false;
        }
        let title = format!(" {} ", raw.title.as_deref().unwrap_or_default().to_lowercase());
        let text = raw.search_text().to_lowercase();
        let has_keyword = self
            .keywords
            .iter()
            .any(|k| text.contains(&k.to_lowercase()));
        let has_marker = self
            .title_markers
            .iter()
            .any(|m| title.contains(&m.to_lowercase()));
        has_keyword && has_marker
    }
}

pub struct Normalizer<'a> {
    zone: Tz,
    categorizer: Option<&'a Categorizer>,
}

impl<'a> Normalizer<'a> {
    pub fn new(zone: Tz, categorizer: Option<&'a Categorizer>) -> Self {
        Self { zone, categorizer }
    }

    pub fn normalize(&self, raw: RawRecord, source_name: &str, group: Option<&str>) -> Event {
        let title = raw
            .title
            .as_deref()
            .map(strip_html)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        let start = raw
            .start
            .as_deref()
            .and_then(|s| coerce_datetime(s, self.zone));
        let start_iso = start.as_ref().map(to_iso);
        let end_iso = raw
            .end
            .as_deref()
            .and_then(|s| coerce_datetime(s, self.zone))
            .map(|dt| to_iso(&dt))
            .or_else(|| start_iso.clone());

        let description = raw
            .description
            .as_deref()
            .map(strip_html)
            .filter(|d| !d.is_empty());
        let location = clean(raw.location).map(|l| strip_html(&l)).filter(|l| !l.is_empty());

        let category = clean(raw.category).or_else(|| {
            let desc = description.as_deref().unwrap_or_default();
            match self.categorizer {
                Some(c) => Some(c.categorize(&title, desc, source_name, location.as_deref())),
                None => fallback_category(&format!("{} {}", title, desc)),
            }
        });

        Event {
            title,
            start_iso,
            end_iso,
            location,
            cost: clean(raw.cost),
            link: clean(raw.link),
            source: source_name.to_string(),
            category,
            description,
            group: group.map(|g| g.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central() -> Tz {
        Tz::America__Chicago
    }

    fn iso(raw: &str) -> Option<String> {
        coerce_datetime(raw, central()).map(|dt| to_iso(&dt))
    }

    #[test]
    fn test_coerce_machine_formats() {
        assert_eq!(iso("2025-03-01T19:00:00-06:00").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(iso("2025-03-02T01:00:00Z").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(iso("Sat, 01 Mar 2025 19:00:00 -0600").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(iso("20250302T010000Z").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(iso("20250301T190000").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(iso("20250301").as_deref(), Some("2025-03-01T00:00:00-06:00"));
        assert_eq!(iso("2025-03-01").as_deref(), Some("2025-03-01T00:00:00-06:00"));
        assert_eq!(iso("2025-03-01 19:30").as_deref(), Some("2025-03-01T19:30:00-06:00"));
    }

    #[test]
    fn test_coerce_listing_phrasing() {
        assert_eq!(iso("March 1, 2025 7:00 PM").as_deref(), Some("2025-03-01T19:00:00-06:00"));
        assert_eq!(
            iso("Saturday, March 1st, 2025 at 7pm - 9pm CST").as_deref(),
            Some("2025-03-01T19:00:00-06:00")
        );
        assert_eq!(iso("03/01/2025").as_deref(), Some("2025-03-01T00:00:00-06:00"));
        assert_eq!(iso("Mar 1, 2025").as_deref(), Some("2025-03-01T00:00:00-06:00"));
    }

    #[test]
    fn test_naive_times_follow_daylight_saving() {
        assert_eq!(iso("2025-07-04 19:00").as_deref(), Some("2025-07-04T19:00:00-05:00"));
        assert_eq!(iso("2025-07-05T00:00:00Z").as_deref(), Some("2025-07-04T19:00:00-05:00"));
        assert_eq!(iso("November 2, 2025 1:30 AM").as_deref(), Some("2025-11-02T01:30:00-05:00"));
        // 2:30 on the spring-forward night never happens in Chicago
        assert_eq!(iso("2025-03-09 02:30"), None);
    }

    #[test]
    fn test_coerce_garbage_is_none() {
        assert_eq!(iso(""), None);
        assert_eq!(iso("TBA"), None);
        assert_eq!(iso("sometime next week"), None);
    }

    #[test]
    fn test_normalize_defaults() {
        let n = Normalizer::new(central(), None);
        let raw = RawRecord {
            start: Some("not a date".to_string()),
            description: Some("<p>Bring   a <em>chair</em></p>".to_string()),
            location: Some("   ".to_string()),
            ..Default::default()
        };
        let ev = n.normalize(raw, "Library", Some("Community"));
        assert_eq!(ev.title, "Untitled");
        assert_eq!(ev.start_iso, None);
        assert_eq!(ev.end_iso, None);
        assert_eq!(ev.location, None);
        assert_eq!(ev.description.as_deref(), Some("Bring a chair"));
        assert_eq!(ev.group.as_deref(), Some("Community"));
        assert_eq!(ev.source, "Library");
    }

    #[test]
    fn test_end_defaults_to_start() {
        let n = Normalizer::new(central(), None);
        let raw = RawRecord {
            title: Some("Concert".to_string()),
            start: Some("2025-03-01T19:00:00-06:00".to_string()),
            ..Default::default()
        };
        let ev = n.normalize(raw, "Venue", None);
        assert_eq!(ev.end_iso, ev.start_iso);
        assert_eq!(ev.category.as_deref(), Some("Music"), "fallback map applies");
    }

    #[test]
    fn test_raw_category_wins() {
        let cat = Categorizer::default();
        let n = Normalizer::new(central(), Some(&cat));
        let raw = RawRecord {
            title: Some("Jazz concert".to_string()),
            category: Some("Nightlife".to_string()),
            ..Default::default()
        };
        assert_eq!(n.normalize(raw, "Venue", None).category.as_deref(), Some("Nightlife"));
    }

    #[test]
    fn test_exclusion_rule_requires_keyword_and_marker() {
        let rule = ExclusionRule {
            source: "Visit Oxford".to_string(),
            keywords: vec!["ole miss".to_string()],
            title_markers: vec![" vs ".to_string()],
        };
        let game = RawRecord::titled("Ole Miss vs Alabama");
        let mention = RawRecord::titled("Ole Miss alumni brunch");
        assert!(rule.matches("Visit Oxford", &game));
        assert!(!rule.matches("Visit Oxford", &mention));
        assert!(!rule.matches("Ole Miss Athletics", &game));
    }
}
