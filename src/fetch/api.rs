// File: ./src/fetch/api.rs
//! JSON API sources: SeatGeek, Ticketmaster Discovery and a generic shape.
use crate::fetch::{Adapter, FetchContext, endpoint_of};
use crate::model::{RawRecord, Source};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

pub const JSON_TAG: &str = "json";
pub const SEATGEEK_TAG: &str = "seatgeek";
pub const TICKETMASTER_TAG: &str = "ticketmaster";

const SEATGEEK_ENDPOINT: &str = "https://api.seatgeek.com/2/events";
const TICKETMASTER_ENDPOINT: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const SEATGEEK_KEY_ENV: &str = "SEATGEEK_CLIENT_ID";
const TICKETMASTER_KEY_ENV: &str = "TICKETMASTER_API_KEY";
const PAGE_SIZE: &str = "100";

/// Appends the non-empty `pairs` to `base` as form-encoded query pairs.
fn with_query(base: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base.trim()).with_context(|| format!("Invalid API endpoint '{}'", base))?;
    {
        let mut query = url.query_pairs_mut();
        for (k, v) in pairs.iter().filter(|(_, v)| !v.is_empty()) {
            query.append_pair(k, v);
        }
    }
    Ok(url.into())
}

/// Reads the API key from the environment variable named by the source's
/// `api_key_env` parameter, or `default_env`.
fn api_key(source: &Source, default_env: &str) -> Option<String> {
    let var = source.param("api_key_env").unwrap_or(default_env);
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
        _ => {
            log::warn!("{}: ${} is not set, skipping", source.name, var);
            None
        }
    }
}

/// Value at a `/`-separated path, e.g. `venue/name` or `images/0/url`.
fn at<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('/').try_fold(value, |v, key| match key.parse::<usize>() {
        Ok(idx) => v.get(idx),
        Err(_) => v.get(key),
    })
}

fn text_at(value: &Value, path: &str) -> Option<String> {
    let s = match at(value, path)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn first_text(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| text_at(value, p))
}

/// "From $N" for a positive price, "Free" for zero, "Varies" when absent.
fn price_label(value: Option<&Value>) -> String {
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_start_matches('$').parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        None => "Varies".to_string(),
        Some(a) if a <= 0.0 => "Free".to_string(),
        Some(a) if a.fract() == 0.0 => format!("From ${}", a as i64),
        Some(a) => format!("From ${:.2}", a),
    }
}

fn segment_category(segment: &str) -> Option<String> {
    let segment = segment.to_lowercase();
    let label = if segment.contains("music") || segment == "concert" {
        "Music"
    } else if segment.contains("sport") {
        "Sports"
    } else if ["arts", "theatre", "theater"].iter().any(|k| segment.contains(k)) {
        "Performing Arts"
    } else {
        return None;
    };
    Some(label.to_string())
}

fn join_present(parts: &[Option<String>]) -> Option<String> {
    let present: Vec<&str> = parts.iter().flatten().map(|s| s.as_str()).collect();
    (!present.is_empty()).then(|| present.join(", "))
}

pub fn parse_seatgeek(doc: &Value) -> Vec<RawRecord> {
    let Some(events) = doc.get("events").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    events
        .iter()
        .map(|ev| RawRecord {
            title: first_text(ev, &["title", "short_title"]),
            start: first_text(ev, &["datetime_local", "datetime_utc"]),
            end: None,
            location: join_present(&[
                text_at(ev, "venue/name"),
                text_at(ev, "venue/city"),
                text_at(ev, "venue/state"),
            ]),
            link: text_at(ev, "url"),
            description: text_at(ev, "description"),
            cost: Some(price_label(at(ev, "stats/lowest_price"))),
            category: text_at(ev, "type").and_then(|t| segment_category(&t)),
            image: text_at(ev, "performers/0/image"),
        })
        .collect()
}

pub fn parse_ticketmaster(doc: &Value) -> Vec<RawRecord> {
    let Some(events) = at(doc, "_embedded/events").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    events
        .iter()
        .map(|ev| {
            let local = match (text_at(ev, "dates/start/localDate"), text_at(ev, "dates/start/localTime")) {
                (Some(d), Some(t)) => Some(format!("{}T{}", d, t)),
                (Some(d), None) => Some(d),
                _ => None,
            };
            RawRecord {
                title: text_at(ev, "name"),
                start: text_at(ev, "dates/start/dateTime").or(local),
                end: text_at(ev, "dates/end/dateTime"),
                location: join_present(&[
                    text_at(ev, "_embedded/venues/0/name"),
                    text_at(ev, "_embedded/venues/0/city/name"),
                    text_at(ev, "_embedded/venues/0/state/stateCode"),
                ]),
                link: text_at(ev, "url"),
                description: first_text(ev, &["info", "description", "pleaseNote"]),
                cost: Some(price_label(at(ev, "priceRanges/0/min"))),
                category: text_at(ev, "classifications/0/segment/name").and_then(|s| segment_category(&s)),
                image: text_at(ev, "images/0/url"),
            }
        })
        .collect()
}

/// Accepts a top-level array of objects or an object holding an `events`
/// array, and maps the usual field names.
pub fn parse_generic(doc: &Value) -> Vec<RawRecord> {
    let items = match doc {
        Value::Array(items) => items,
        other => match other.get("events").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => return Vec::new(),
        },
    };
    items
        .iter()
        .filter(|v| v.is_object())
        .map(|ev| RawRecord {
            title: first_text(ev, &["title", "name", "summary"]),
            start: first_text(ev, &["start", "start_iso", "start_date", "startDate", "start_time", "datetime", "date"]),
            end: first_text(ev, &["end", "end_iso", "end_date", "endDate", "end_time"]),
            location: first_text(ev, &["location", "location/name", "venue", "venue/name"]),
            link: first_text(ev, &["link", "url"]),
            description: first_text(ev, &["description", "details"]),
            cost: first_text(ev, &["cost", "price"]),
            category: first_text(ev, &["category"]),
            image: first_text(ev, &["image", "image_url"]),
        })
        .collect()
}

pub struct JsonApiAdapter;

impl Adapter for JsonApiAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let doc = ctx.http.get_json(url).await?;
            Ok(parse_generic(&doc))
        })
    }
}

pub struct SeatGeekAdapter;

impl Adapter for SeatGeekAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let Some(key) = api_key(source, SEATGEEK_KEY_ENV) else {
                return Ok(Vec::new());
            };
            let base = source.endpoint.as_deref().unwrap_or(SEATGEEK_ENDPOINT);
            let url = with_query(
                base,
                &[
                    ("venue.city", source.param("city").unwrap_or_default()),
                    ("venue.state", source.param("state").unwrap_or_default()),
                    ("per_page", PAGE_SIZE),
                    ("client_id", key.as_str()),
                ],
            )?;
            let doc = ctx.http.get_json(&url).await?;
            Ok(parse_seatgeek(&doc))
        })
    }
}

pub struct TicketmasterAdapter;

impl Adapter for TicketmasterAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let Some(key) = api_key(source, TICKETMASTER_KEY_ENV) else {
                return Ok(Vec::new());
            };
            let base = source.endpoint.as_deref().unwrap_or(TICKETMASTER_ENDPOINT);
            let url = with_query(
                base,
                &[
                    ("city", source.param("city").unwrap_or_default()),
                    ("stateCode", source.param("state").unwrap_or_default()),
                    ("size", PAGE_SIZE),
                    ("apikey", key.as_str()),
                ],
            )?;
            let doc = ctx.http.get_json(&url).await?;
            Ok(parse_ticketmaster(&doc))
        })
    }
}
