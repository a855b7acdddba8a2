// File: ./src/fetch/calendar.rs
//! iCalendar (`.ics`) sources.
use crate::fetch::{Adapter, FetchContext, endpoint_of};
use crate::model::{RawRecord, Source};
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use icalendar::{Calendar, CalendarComponent, Component, Event};

/// Reverses RFC 5545 TEXT escaping.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn prop(event: &Event, name: &str) -> Option<String> {
    event
        .properties()
        .get(name)
        .map(|p| unescape(p.value().trim()))
        .filter(|v| !v.is_empty())
}

pub fn parse_calendar(text: &str) -> Result<Vec<RawRecord>> {
    let calendar: Calendar = text
        .parse()
        .map_err(|e| anyhow!("Invalid iCalendar data: {}", e))?;

    Ok(calendar
        .components
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(e) => Some(RawRecord {
                title: prop(e, "SUMMARY"),
                start: prop(e, "DTSTART"),
                end: prop(e, "DTEND"),
                location: prop(e, "LOCATION"),
                link: prop(e, "URL"),
                description: prop(e, "DESCRIPTION"),
                cost: None,
                category: None,
                image: None,
            }),
            _ => None,
        })
        .collect())
}

pub struct CalendarAdapter;

impl Adapter for CalendarAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let body = ctx.http.get_text(url).await?;
            let records = parse_calendar(&body)?;
            log::debug!("{}: {} calendar events", source.name, records.len());
            Ok(records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:1@test\r\n\
SUMMARY:Lecture: Faulkner\\, Revisited\r\n\
DTSTART:20250301T190000Z\r\n\
DTEND:20250301T203000Z\r\n\
LOCATION:Bryant Hall\r\n\
DESCRIPTION:Line one\\nLine two\r\n\
URL:https://example.com/faulkner\r\n\
END:VEVENT\r\n\
BEGIN:VTODO\r\n\
UID:2@test\r\n\
SUMMARY:Not an event\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_calendar_events_only() {
        let records = parse_calendar(ICS).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title.as_deref(), Some("Lecture: Faulkner, Revisited"));
        assert_eq!(r.start.as_deref(), Some("20250301T190000Z"));
        assert_eq!(r.end.as_deref(), Some("20250301T203000Z"));
        assert_eq!(r.location.as_deref(), Some("Bryant Hall"));
        assert_eq!(r.description.as_deref(), Some("Line one\nLine two"));
        assert_eq!(r.link.as_deref(), Some("https://example.com/faulkner"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\;b\,c\\d\ne"), "a;b,c\\d\ne");
    }
}
