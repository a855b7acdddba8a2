// File: ./src/fetch/page.rs
//! HTML listing pages.
//!
//! `simple_list` is the fallback for any page. `bandsintown` and
//! `visit_oxford` know the card layout of those sites; `visit_oxford` also
//! follows each event's detail page. Social-network pages cannot be scraped
//! and get a single stub record pointing at the profile.
use crate::fetch::html::{
    Anchor, anchors, class_blocks, class_text, document_title, heading_text, json_ld_events,
    meta_content, time_attr,
};
use crate::fetch::redirect::resolve_url;
use crate::fetch::{Adapter, FetchContext, endpoint_of};
use crate::model::{RawRecord, Source};
use anyhow::Result;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;

pub const SIMPLE_LIST_TAG: &str = "simple_list";
pub const BANDSINTOWN_TAG: &str = "bandsintown";
pub const VISIT_OXFORD_TAG: &str = "visit_oxford";
pub const SOCIAL_TAG: &str = "social";

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "fb.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "threads.net",
];

const LINK_HINTS: &[&str] = &["event", "calendar", "show", "game"];
const DESCRIPTION_LIMIT: usize = 500;
const DETAIL_CONCURRENCY: usize = 4;

pub fn is_social_host(host: &str) -> bool {
    let host = host.trim().to_lowercase();
    SOCIAL_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

fn truncate_chars(text: String, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text,
    }
}

fn param_or(source: &Source, key: &str) -> Option<String> {
    source.param(key).map(|s| s.to_string())
}

/// Keeps the first record for each `(title, start)` pair.
fn dedupe_records(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.title.clone(), r.start.clone())))
        .collect()
}

pub struct SocialStubAdapter;

impl Adapter for SocialStubAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, _ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            Ok(vec![RawRecord {
                title: Some("Social feed (open to browse)".to_string()),
                link: Some(url.to_string()),
                ..Default::default()
            }])
        })
    }
}

/// Event cards (`<article|div|li class="…event…">`) with a heading, plus
/// any JSON-LD events on the page.
fn parse_cards(html: &str, base_url: &str, default_location: Option<String>) -> Vec<RawRecord> {
    let mut records = json_ld_events(html);
    for block in class_blocks(html, &["article", "div", "li"], &["event"]) {
        let Some(title) = class_text(block, &["title", "name"]).or_else(|| heading_text(block, None))
        else {
            continue;
        };
        let start = time_attr(block).or_else(|| class_text(block, &["date", "time"]));
        let link = anchors(block)
            .first()
            .and_then(|a| resolve_url(base_url, &a.href));
        records.push(RawRecord {
            title: Some(title),
            start,
            location: class_text(block, &["venue", "location"]).or_else(|| default_location.clone()),
            link,
            description: class_text(block, &["description", "summary"]),
            ..Default::default()
        });
    }
    for record in records.iter_mut() {
        if let Some(link) = record.link.take() {
            record.link = resolve_url(base_url, &link).or(Some(link));
        }
    }
    dedupe_records(records)
}

/// Anchors whose text or target looks like an event listing.
fn parse_links(html: &str, base_url: &str) -> Vec<RawRecord> {
    let mut records: Vec<RawRecord> = anchors(html)
        .into_iter()
        .filter(|a| !a.text.is_empty())
        .filter(|a| {
            let haystack = format!("{} {}", a.href, a.text).to_lowercase();
            LINK_HINTS.iter().any(|k| haystack.contains(k))
        })
        .map(|a| RawRecord {
            title: Some(a.text),
            link: resolve_url(base_url, &a.href).or(Some(a.href)),
            ..Default::default()
        })
        .collect();
    records = dedupe_records(records);
    if records.is_empty() {
        records.push(RawRecord {
            title: Some("Events listing".to_string()),
            link: Some(base_url.to_string()),
            ..Default::default()
        });
    }
    records
}

/// Generic best-effort extraction: event cards when the page has them,
/// otherwise event-looking links, otherwise one record for the listing.
pub fn parse_simple_list(html: &str, base_url: &str) -> Vec<RawRecord> {
    let cards = parse_cards(html, base_url, None);
    if !cards.is_empty() {
        return cards;
    }
    parse_links(html, base_url)
}

pub struct SimpleListAdapter;

impl Adapter for SimpleListAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let html = ctx.http.get_text(url).await?;
            Ok(parse_simple_list(&html, url))
        })
    }
}

/// Bandsintown city pages. Cards without both a title and a date are
/// dropped.
pub fn parse_bandsintown(html: &str, base_url: &str, default_location: Option<String>) -> Vec<RawRecord> {
    let mut records = json_ld_events(html);
    for block in class_blocks(html, &["div", "article"], &["event", "concert"]) {
        let title = class_text(block, &["title", "name", "artist"]).or_else(|| heading_text(block, None));
        let start = time_attr(block).or_else(|| class_text(block, &["date"]));
        let (Some(title), Some(start)) = (title, start) else {
            continue;
        };
        records.push(RawRecord {
            title: Some(title),
            start: Some(start),
            location: class_text(block, &["venue"]).or_else(|| default_location.clone()),
            link: anchors(block)
                .first()
                .and_then(|a| resolve_url(base_url, &a.href))
                .or_else(|| Some(base_url.to_string())),
            category: Some("Music".to_string()),
            cost: Some("Varies".to_string()),
            ..Default::default()
        });
    }
    for record in records.iter_mut() {
        if record.location.is_none() {
            record.location = default_location.clone();
        }
    }
    dedupe_records(records.into_iter().filter(|r| r.start.is_some()).collect())
}

pub struct BandsintownAdapter;

impl Adapter for BandsintownAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let html = ctx.http.get_text(url).await?;
            Ok(parse_bandsintown(&html, url, param_or(source, "default_location")))
        })
    }
}

/// Absolute, de-duplicated links to event detail pages, in page order.
pub fn detail_links(html: &str, base_url: &str) -> Vec<Anchor> {
    let mut seen = HashSet::new();
    anchors(html)
        .into_iter()
        .filter(|a| a.href.to_lowercase().contains("/event"))
        .filter_map(|a| {
            let href = resolve_url(base_url, &a.href)?;
            seen.insert(href.clone()).then_some(Anchor { href, text: a.text })
        })
        .collect()
}

/// One event from a detail page. `None` when no date can be found.
pub fn parse_detail(html: &str, link: &Anchor, default_location: Option<String>) -> Option<RawRecord> {
    if let Some(mut record) = json_ld_events(html).into_iter().next()
        && record.start.is_some()
    {
        record.link = Some(link.href.clone());
        if record.location.is_none() {
            record.location = default_location;
        }
        return Some(record);
    }

    let title = heading_text(html, Some(1))
        .or_else(|| class_text(html, &["event-title", "event-name"]))
        .or_else(|| meta_content(html, "og:title"))
        .or_else(|| document_title(html))
        .filter(|t| t.chars().count() > 3)
        .or_else(|| (!link.text.is_empty()).then(|| link.text.clone()));

    let start = class_text(html, &["event-date", "date"])
        .or_else(|| time_attr(html))
        .or_else(|| meta_content(html, "event:start_time"))?;

    let description = class_text(html, &["event-description", "description", "event-details"])
        .or_else(|| meta_content(html, "og:description"))
        .map(|d| truncate_chars(d, DESCRIPTION_LIMIT));

    Some(RawRecord {
        title,
        start: Some(start),
        location: class_text(html, &["event-location", "location", "venue"]).or(default_location),
        link: Some(link.href.clone()),
        description,
        ..Default::default()
    })
}

pub struct VisitOxfordAdapter;

impl Adapter for VisitOxfordAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let html = ctx.http.get_text(url).await?;
            let links = detail_links(&html, url);
            let default_location = param_or(source, "default_location");

            if links.len() > ctx.max_detail_fetches {
                log::info!(
                    "{}: {} detail links, following the first {}",
                    source.name,
                    links.len(),
                    ctx.max_detail_fetches
                );
            }

            let details: Vec<Option<RawRecord>> = stream::iter(links.into_iter().take(ctx.max_detail_fetches))
                .map(|link| {
                    let default_location = default_location.clone();
                    async move {
                        match ctx.http.get_text_with_timeout(&link.href, ctx.detail_timeout).await {
                            Ok(body) => {
                                let parsed = parse_detail(&body, &link, default_location);
                                if parsed.is_none() {
                                    log::debug!("Skipping {} (no date found)", link.href);
                                }
                                parsed
                            }
                            Err(e) => {
                                log::warn!("Detail page {} failed: {:#}", link.href, e);
                                None
                            }
                        }
                    }
                })
                .buffered(DETAIL_CONCURRENCY)
                .collect()
                .await;

            Ok(details.into_iter().flatten().collect())
        })
    }
}
