// File: ./src/pipeline/dedupe.rs
//! Two-stage duplicate collapsing across sources.
//!
//! Stage A collapses records sharing a start minute and canonical venue.
//! Stage B clusters the survivors by fuzzy title/description similarity
//! within calendar-date buckets. Both stages only ever fill empty fields on
//! the retained record.
use crate::config::DedupeConfig;
use crate::model::Event;
use crate::model::merge::backfill;
use crate::pipeline::similarity::token_set_ratio;
use crate::pipeline::venue::VenueResolver;
use chrono_tz::Tz;
use std::collections::HashMap;

const UNKNOWN_BUCKET: &str = "unknown";

pub struct Deduplicator<'a> {
    venues: &'a VenueResolver,
    config: &'a DedupeConfig,
    zone: Tz,
}

impl<'a> Deduplicator<'a> {
    pub fn new(venues: &'a VenueResolver, config: &'a DedupeConfig, zone: Tz) -> Self {
        Self {
            venues,
            config,
            zone,
        }
    }

    pub fn dedupe(&self, events: Vec<Event>) -> Vec<Event> {
        let before = events.len();
        let exact = self.collapse_exact(events);
        let after_exact = exact.len();
        let result = self.cluster_fuzzy(exact);
        log::debug!(
            "Dedupe: {} in, {} after exact collapse, {} after fuzzy clustering",
            before,
            after_exact,
            result.len()
        );
        result
    }

    fn exact_key(&self, event: &Event) -> Option<(i64, String)> {
        let start = event.start()?;
        if !event.has_location() {
            return None;
        }
        let venue = self.venues.canonical(event.location.as_deref().unwrap_or_default());
        if venue.is_empty() {
            return None;
        }
        Some((start.timestamp().div_euclid(60), venue))
    }

    /// Stage A. Output keeps first-appearance order; a later record with a
    /// strictly longer title takes over its key's slot.
    pub fn collapse_exact(&self, events: Vec<Event>) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::with_capacity(events.len());
        let mut slots: HashMap<(i64, String), usize> = HashMap::new();

        for event in events {
            let Some(key) = self.exact_key(&event) else {
                out.push(event);
                continue;
            };
            match slots.get(&key).copied() {
                Some(idx) => {
                    let existing = &mut out[idx];
                    if event.title.chars().count() > existing.title.chars().count() {
                        let dropped = std::mem::replace(existing, event);
                        backfill(existing, &dropped);
                    } else {
                        backfill(existing, &event);
                    }
                }
                None => {
                    slots.insert(key, out.len());
                    out.push(event);
                }
            }
        }
        out
    }

    fn bucket_key(&self, event: &Event) -> String {
        match event.start() {
            Some(dt) => dt.with_timezone(&self.zone).date_naive().to_string(),
            None => UNKNOWN_BUCKET.to_string(),
        }
    }

    pub fn is_match(&self, a: &Event, b: &Event) -> bool {
        let title_score = token_set_ratio(&a.title, &b.title);
        if title_score >= f64::from(self.config.title_threshold) {
            return true;
        }
        if title_score < f64::from(self.config.title_floor) {
            return false;
        }
        let description_score = token_set_ratio(
            a.description.as_deref().unwrap_or_default(),
            b.description.as_deref().unwrap_or_default(),
        );
        description_score >= f64::from(self.config.description_floor)
    }

    /// Stage B. A candidate joins a cluster when it matches the anchor or any
    /// record already merged into it. Merged records never become anchors.
    pub fn cluster_fuzzy(&self, events: Vec<Event>) -> Vec<Event> {
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<Event>> = HashMap::new();
        for event in events {
            let key = self.bucket_key(&event);
            if !buckets.contains_key(&key) {
                order.push(key.clone());
            }
            buckets.entry(key).or_default().push(event);
        }

        let mut out = Vec::new();
        for key in order {
            let Some(bucket) = buckets.remove(&key) else {
                continue;
            };
            out.extend(self.cluster_bucket(bucket));
        }
        out
    }

    fn cluster_bucket(&self, bucket: Vec<Event>) -> Vec<Event> {
        let n = bucket.len();
        let mut merged = vec![false; n];
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for anchor in 0..n {
            if merged[anchor] {
                continue;
            }
            let mut members = vec![anchor];
            for candidate in (anchor + 1)..n {
                if merged[candidate] {
                    continue;
                }
                if members
                    .iter()
                    .any(|&m| self.is_match(&bucket[m], &bucket[candidate]))
                {
                    merged[candidate] = true;
                    members.push(candidate);
                }
            }
            clusters.push(members);
        }

        let mut slots: Vec<Option<Event>> = bucket.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(clusters.len());
        for members in clusters {
            let Some(mut kept) = slots[members[0]].take() else {
                continue;
            };
            for &m in &members[1..] {
                if let Some(dropped) = slots[m].take() {
                    log::debug!("Merging '{}' into '{}'", dropped.title, kept.title);
                    backfill(&mut kept, &dropped);
                }
            }
            out.push(kept);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn central() -> Tz {
        Tz::America__Chicago
    }

    fn event(title: &str, start: Option<&str>, location: Option<&str>) -> Event {
        let mut ev = Event::new(title, "Test");
        ev.start_iso = start.map(String::from);
        ev.location = location.map(String::from);
        ev
    }

    fn run(events: Vec<Event>) -> Vec<Event> {
        let mut aliases = BTreeMap::new();
        aliases.insert("the pavilion".to_string(), "sjb pavilion".to_string());
        let venues = VenueResolver::new(&aliases);
        let config = DedupeConfig::default();
        Deduplicator::new(&venues, &config, central()).dedupe(events)
    }

    #[test]
    fn test_exact_collapse_keeps_longer_title_and_backfills() {
        let mut short = event("Hoops", Some("2025-03-01T19:00:00-06:00"), Some("The Pavilion"));
        short.link = Some("https://a.example".to_string());
        let mut long = event(
            "Basketball: Rebels vs Tigers",
            Some("2025-03-01T19:00:30-06:00"),
            Some("SJB Pavilion"),
        );
        long.cost = Some("$15".to_string());

        let out = run(vec![short, long]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Basketball: Rebels vs Tigers");
        assert_eq!(out[0].link.as_deref(), Some("https://a.example"));
        assert_eq!(out[0].cost.as_deref(), Some("$15"));
    }

    #[test]
    fn test_exact_collapse_tie_keeps_first() {
        let mut first = event("Gala", Some("2025-03-01T19:00:00-06:00"), Some("Lyric"));
        first.source = "First".to_string();
        let mut second = event("Fête", Some("2025-03-02T01:00:00Z"), Some("lyric"));
        second.source = "Second".to_string();

        let venues = VenueResolver::default();
        let config = DedupeConfig::default();
        let out = Deduplicator::new(&venues, &config, central()).collapse_exact(vec![first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "First");
    }

    #[test]
    fn test_records_without_start_or_location_bypass_exact_stage() {
        let venues = VenueResolver::default();
        let config = DedupeConfig::default();
        let d = Deduplicator::new(&venues, &config, central());
        let out = d.collapse_exact(vec![
            event("A", None, Some("Lyric")),
            event("A", None, Some("Lyric")),
            event("B", Some("2025-03-01T19:00:00-06:00"), None),
            event("B", Some("2025-03-01T19:00:00-06:00"), None),
        ]);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_fuzzy_merge_same_day() {
        let a = event("Oxford Farmers Market", Some("2025-03-01T08:00:00-06:00"), None);
        let mut b = event(
            "Oxford Farmer's Market \u{2014} Weekly",
            Some("2025-03-01T09:00:00-06:00"),
            Some("Oxford Square"),
        );
        b.description = Some("Local produce".to_string());

        let out = run(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Oxford Farmers Market");
        assert_eq!(out[0].location.as_deref(), Some("Oxford Square"));
        assert_eq!(out[0].description.as_deref(), Some("Local produce"));
    }

    #[test]
    fn test_fuzzy_never_crosses_dates() {
        let a = event("Oxford Farmers Market", Some("2025-03-01T08:00:00-06:00"), None);
        let b = event("Oxford Farmers Market", Some("2025-03-08T08:00:00-06:00"), None);
        assert_eq!(run(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_bucket_uses_configured_zone() {
        // 05:45 UTC on the 2nd is still the 1st in the configured zone
        let a = event("Late Show", Some("2025-03-01T23:30:00-06:00"), None);
        let b = event("Late Show", Some("2025-03-02T05:45:00Z"), None);
        assert_eq!(run(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_bucket_follows_daylight_saving() {
        // 04:30 UTC on July 5th is 23:30 CDT on the 4th, but would be the 5th at -06:00
        let a = event("Fireworks Cruise", Some("2025-07-04T21:00:00-05:00"), None);
        let b = event("Fireworks Cruise", Some("2025-07-05T04:30:00Z"), None);
        assert_eq!(run(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_unrelated_titles_stay_apart() {
        let a = event("Trivia Night", Some("2025-03-01T19:00:00-06:00"), None);
        let b = event("Jazz Quartet", Some("2025-03-01T19:00:00-06:00"), None);
        assert_eq!(run(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_description_rescues_mid_range_titles() {
        let day = Some("2025-03-01T19:00:00-06:00");
        let mut a = event("Live music on the porch", day, None);
        a.description = Some("Acoustic set by the Hill Country duo".to_string());
        let mut b = event("Live music on the patio", day, None);
        b.description = Some("Acoustic set by the Hill Country duo".to_string());
        assert_eq!(run(vec![a.clone(), b]).len(), 1);

        let mut c = event("Live music on the patio", day, None);
        c.description = Some("Brass band brunch".to_string());
        assert_eq!(run(vec![a, c]).len(), 2);
    }

    #[test]
    fn test_cluster_members_match_later_candidates() {
        let day = Some("2025-03-01T08:00:00-06:00");
        let out = run(vec![
            event("Oxford Farmers Market", day, None),
            event("Oxford Farmers Market Weekly", day, None),
            // matches only the second record, not the anchor
            event("Oxford Weekly Market", day, None),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Oxford Farmers Market");
    }

    #[test]
    fn test_undated_records_cluster_together() {
        let out = run(vec![
            event("Open Mic", None, None),
            event("Trivia", Some("2025-03-01T19:00:00-06:00"), None),
            event("open mic", None, None),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Open Mic");
        assert_eq!(out[1].title, "Trivia");
    }
}
