// File: ./src/fetch/athletics.rs
//! Ole Miss athletics schedule pages.
//!
//! Only home games are kept: a game is away when its opponent is introduced
//! by "at" or "@" rather than "vs". Schedule rows rarely carry a year, so the
//! next occurrence of the month/day on or after today is used.
use crate::fetch::html::class_blocks;
use crate::fetch::{Adapter, FetchContext, endpoint_of};
use crate::model::{RawRecord, Source};
use crate::text::{capitalize_words, strip_html};
use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use futures::future::BoxFuture;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const OLEMISS_ATHLETICS_TAG: &str = "olemiss_athletics";

const CATEGORY: &str = "Ole Miss Athletics";
const DEFAULT_SPORT: &str = "football";
const DEFAULT_HOUR: u32 = 19;
const RESULT_PREFIXES: &[&str] = &["final", "cancelled", "canceled", "postponed"];
const PLACEHOLDERS: &[&str] = &["opponent", "tbd", "tba"];

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})\b")
            .expect("static regex")
    })
}

fn opponent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:^|\s)((?i:vs\.?|versus|at)|@)\s*(?:#\d+\s+)?([A-Z][A-Za-z.&'\- ]*?)\s*(?:[,(|/]|\b(?:Logo|Oxford|TV|Radio|Tickets|Box Score|Recap|Preview|Noon)\b|\d|$)",
        )
        .expect("static regex")
    })
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(noon)\b|\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\b").expect("static regex"))
}

fn row_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("static regex"))
}

fn cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<t([dh])\b[^>]*>(.*?)</t[dh]\s*>").expect("static regex"))
}

fn result_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[WLT]\s*,?\s*\d").expect("static regex"))
}

/// Venue and naming for one sport's schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct SportProfile {
    pub venue: String,
    /// e.g. "Football", "Women's Basketball".
    pub label: String,
    /// Title prefix before " vs <opponent>".
    pub team: String,
}

impl SportProfile {
    /// Basketball is split by gender from the sport name, the source name,
    /// then the page URL, in that order.
    pub fn new(sport: &str, source_name: &str, url: &str) -> Self {
        let sport_lower = sport.trim().to_lowercase();
        let plain = |venue: &str, label: &str| Self {
            venue: venue.to_string(),
            label: label.to_string(),
            team: "Ole Miss".to_string(),
        };

        match sport_lower.as_str() {
            "football" => plain("Vaught-Hemingway Stadium", "Football"),
            "baseball" => plain("Swayze Field", "Baseball"),
            "softball" => plain("Ole Miss Softball Complex", "Softball"),
            "volleyball" => plain("The Pavilion", "Volleyball"),
            s if s.contains("basketball") => {
                let source_lower = source_name.to_lowercase();
                let url_lower = url.to_lowercase();
                let women = if s.contains("women") || s.contains("wbb") || source_lower.contains("women") {
                    true
                } else if s.contains("men") || s.contains("mbb") || source_lower.contains("men") {
                    false
                } else {
                    url_lower.contains("women")
                };
                let label = if women { "Women's Basketball" } else { "Men's Basketball" };
                Self {
                    venue: "The Pavilion".to_string(),
                    label: label.to_string(),
                    team: format!("Ole Miss {}", label),
                }
            }
            _ => Self {
                venue: "TBD".to_string(),
                label: capitalize_words(&sport_lower),
                team: "Ole Miss".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Game {
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    opponent: String,
    home: bool,
}

fn month_number(abbr: &str) -> Option<u32> {
    let idx = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"]
        .iter()
        .position(|m| abbr.to_lowercase().starts_with(m))?;
    Some(idx as u32 + 1)
}

fn month_day(text: &str) -> Option<(u32, u32)> {
    let caps = month_day_re().captures(text)?;
    Some((month_number(&caps[1])?, caps[2].parse().ok()?))
}

/// Kickoff time in `text`, 19:00 when none is given.
fn kickoff(text: &str) -> (u32, u32) {
    let Some(caps) = time_re().captures(text) else {
        return (DEFAULT_HOUR, 0);
    };
    if caps.get(1).is_some() {
        return (12, 0);
    }
    let hour: u32 = caps[2].parse().unwrap_or(DEFAULT_HOUR);
    let minute: u32 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let pm = caps[4].eq_ignore_ascii_case("p");
    let hour = match (pm, hour) {
        (true, h) if h < 12 => h + 12,
        (false, 12) => 0,
        (_, h) => h,
    };
    if hour > 23 || minute > 59 {
        return (DEFAULT_HOUR, 0);
    }
    (hour, minute)
}

fn tidy_opponent(raw: &str) -> Option<String> {
    let name = raw.trim().trim_end_matches(['-', '.']).trim().to_string();
    let lower = name.to_lowercase();
    if name.chars().count() < 2 || PLACEHOLDERS.contains(&lower.as_str()) {
        return None;
    }
    Some(name)
}

/// One game from the flattened text of a schedule card.
fn parse_game_text(text: &str) -> Option<Game> {
    let (month, day) = month_day(text)?;
    let caps = opponent_re().captures(text)?;
    let marker = caps[1].to_lowercase();
    let opponent = tidy_opponent(&caps[2])?;
    let (hour, minute) = kickoff(text);
    Some(Game {
        month,
        day,
        hour,
        minute,
        opponent,
        home: !(marker == "at" || marker == "@"),
    })
}

/// One game from a `<tr>` whose first cell holds the date. Result columns
/// ("W 31-10", "Final") are skipped when looking for the opponent.
fn parse_table_row(row: &str) -> Option<Game> {
    let cells: Vec<(bool, String)> = cell_re()
        .captures_iter(row)
        .map(|caps| (caps[1].eq_ignore_ascii_case("h"), strip_html(&caps[2])))
        .collect();
    if cells.len() < 2 || cells.iter().any(|(header, _)| *header) {
        return None;
    }

    let (month, day) = month_day(&cells[0].1)?;
    let opponent_cell = cells.iter().skip(1).take(3).map(|(_, text)| text).find(|text| {
        let lower = text.to_lowercase();
        !text.is_empty()
            && !result_re().is_match(text)
            && !RESULT_PREFIXES.iter().any(|p| lower.starts_with(p))
    })?;

    let lower = opponent_cell.to_lowercase();
    let home = !(opponent_cell.starts_with('@') || lower.starts_with("at "));
    let stripped = opponent_cell.trim_start_matches('@').trim_start();
    let stripped = ["vs. ", "vs ", "versus ", "v. ", "at "]
        .iter()
        .find_map(|p| {
            stripped
                .get(..p.len())
                .filter(|head| head.eq_ignore_ascii_case(p))
                .map(|_| &stripped[p.len()..])
        })
        .unwrap_or(stripped);
    let opponent = tidy_opponent(stripped.split(['/', '(']).next().unwrap_or_default())?;

    let (hour, minute) = kickoff(&strip_html(row));
    Some(Game {
        month,
        day,
        hour,
        minute,
        opponent,
        home,
    })
}

/// Next `month`/`day` on or after `today`.
fn game_date(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

/// Home games on a schedule page. Schedule cards (class containing
/// `game`, `schedule` or `event`) are read first; tables are the fallback.
pub fn parse_schedule(html: &str, profile: &SportProfile, url: &str, today: NaiveDate) -> Vec<RawRecord> {
    let mut games: Vec<Game> = class_blocks(html, &["div", "li", "article"], &["game", "schedule", "event"])
        .into_iter()
        .filter_map(|block| parse_game_text(&strip_html(block)))
        .collect();
    if games.is_empty() {
        games = row_re()
            .captures_iter(html)
            .filter_map(|caps| parse_table_row(&caps[1]))
            .collect();
    }

    let away = games.iter().filter(|g| !g.home).count();
    if away > 0 {
        log::debug!("{}: skipped {} away games", url, away);
    }

    let mut seen = HashSet::new();
    games
        .into_iter()
        .filter(|g| g.home)
        .filter(|g| seen.insert((g.month, g.day, g.opponent.to_lowercase())))
        .filter_map(|g| {
            let date = game_date(g.month, g.day, today)?;
            let start = date.and_hms_opt(g.hour, g.minute, 0)?;
            let title = format!("{} vs {}", profile.team, g.opponent);
            Some(RawRecord {
                description: Some(format!("{} game: {}", profile.label, title)),
                title: Some(title),
                start: Some(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
                location: Some(profile.venue.clone()),
                link: Some(url.to_string()),
                category: Some(CATEGORY.to_string()),
                cost: Some("Varies".to_string()),
                ..Default::default()
            })
        })
        .collect()
}

/// Reads the `sport` parameter (default football) to pick venue and naming.
pub struct OleMissAthleticsAdapter;

impl Adapter for OleMissAthleticsAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let html = ctx.http.get_text(url).await?;
            let sport = source.param("sport").unwrap_or(DEFAULT_SPORT);
            let profile = SportProfile::new(sport, &source.name, url);
            let records = parse_schedule(&html, &profile, url, Local::now().date_naive());
            log::info!("{}: {} home games", source.name, records.len());
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    fn football() -> SportProfile {
        SportProfile::new("football", "Ole Miss Football", "https://olemisssports.com/sports/football/schedule")
    }

    #[test]
    fn test_profiles() {
        let f = football();
        assert_eq!(f.venue, "Vaught-Hemingway Stadium");
        assert_eq!(f.team, "Ole Miss");

        let wbb = SportProfile::new("basketball", "Ole Miss Women's Hoops", "https://x.example/schedule");
        assert_eq!(wbb.label, "Women's Basketball");
        assert_eq!(wbb.team, "Ole Miss Women's Basketball");
        assert_eq!(wbb.venue, "The Pavilion");

        let by_url = SportProfile::new("basketball", "Hoops", "https://x.example/sports/womens-basketball");
        assert_eq!(by_url.label, "Women's Basketball");
        let mbb = SportProfile::new("basketball", "Hoops", "https://x.example/sports/mens-basketball");
        assert_eq!(mbb.label, "Men's Basketball");

        let other = SportProfile::new("track and field", "Track", "https://x.example");
        assert_eq!(other.venue, "TBD");
        assert_eq!(other.label, "Track And Field");
    }

    #[test]
    fn test_kickoff() {
        assert_eq!(kickoff("Sep 13 / Noon"), (12, 0));
        assert_eq!(kickoff("Sep 13 / 6:30 p.m."), (18, 30));
        assert_eq!(kickoff("Sep 13 / 11 AM"), (11, 0));
        assert_eq!(kickoff("Sep 13 / TBA"), (19, 0));
    }

    #[test]
    fn test_cards_keep_home_games_only() {
        let html = r#"
            <div class="schedule-game">
              <span>Sep 6</span><span>vs</span><span>Kentucky Logo</span>
              <span>Oxford, Miss.</span><span>6:30 PM</span>
            </div>
            <div class="schedule-game">
              <span>Sep 13</span><span>at</span><span>Arkansas</span><span>Fayetteville, Ark.</span>
            </div>
            <div class="schedule-game">
              <span>Sep 20</span><span>@ Tulane</span>
            </div>
            <div class="schedule-game">
              <span>Jan 3</span><span>vs #7 Georgia</span><span>Noon</span>
            </div>"#;
        let records = parse_schedule(html, &football(), "https://olemisssports.com/s", today());
        let titles: Vec<&str> = records.iter().filter_map(|r| r.title.as_deref()).collect();
        assert_eq!(titles, vec!["Ole Miss vs Kentucky", "Ole Miss vs Georgia"]);

        assert_eq!(records[0].start.as_deref(), Some("2025-09-06T18:30:00"));
        assert_eq!(records[0].location.as_deref(), Some("Vaught-Hemingway Stadium"));
        assert_eq!(records[0].category.as_deref(), Some(CATEGORY));
        assert_eq!(records[0].description.as_deref(), Some("Football game: Ole Miss vs Kentucky"));
        // January has already passed on Aug 1st, so it rolls into next year
        assert_eq!(records[1].start.as_deref(), Some("2026-01-03T12:00:00"));
    }

    #[test]
    fn test_table_fallback() {
        let html = r#"<table>
            <tr><th>Date</th><th>Opponent</th><th>Result</th></tr>
            <tr><td>Feb 14 (Fri)</td><td>vs. Texas Tech</td><td>4:00 PM</td></tr>
            <tr><td>Feb 15</td><td>W 5-2</td><td>Tennessee</td></tr>
            <tr><td>Feb 21</td><td>at Louisiana Tech</td><td>6 PM</td></tr>
            <tr><td>Feb 22</td><td>TBA</td></tr>
        </table>"#;
        let baseball = SportProfile::new("baseball", "Ole Miss Baseball", "https://olemisssports.com/b");
        let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let records = parse_schedule(html, &baseball, "https://olemisssports.com/b", today);
        let titles: Vec<&str> = records.iter().filter_map(|r| r.title.as_deref()).collect();
        assert_eq!(titles, vec!["Ole Miss vs Texas Tech", "Ole Miss vs Tennessee"]);
        assert_eq!(records[0].start.as_deref(), Some("2025-02-14T16:00:00"));
        assert_eq!(records[1].start.as_deref(), Some("2025-02-15T19:00:00"));
        assert_eq!(records[0].location.as_deref(), Some("Swayze Field"));
    }

    #[test]
    fn test_repeated_cards_collapse() {
        let card = r#"<li class="game">Oct 4 vs Washington State 11 AM</li>"#;
        let html = format!("{}{}", card, card);
        assert_eq!(parse_schedule(&html, &football(), "https://x.example", today()).len(), 1);
    }
}
