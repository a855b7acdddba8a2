// File: ./src/fetch/html.rs
//! Best-effort HTML scanning for listing and detail pages.
//!
//! These helpers work on raw markup with regular expressions. They are not a
//! DOM; they find the usual event-card shapes (class names containing
//! `event`, `title`, `date`, `venue`...) and schema.org JSON-LD blocks.
use crate::model::RawRecord;
use crate::text::{collapse_whitespace, decode_entities, strip_html};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Largest slice of markup treated as one card.
const MAX_BLOCK_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a\s*>"#)
            .expect("static regex")
    })
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h([1-4])\b[^>]*>(.*?)</h[1-4]\s*>").expect("static regex"))
}

fn datetime_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<[a-z][a-z0-9]*\b[^>]*?\b(?:datetime|content)\s*=\s*["']([^"']+)["'][^>]*>"#)
            .expect("static regex")
    })
}

fn json_ld_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<script\b[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script\s*>"#)
            .expect("static regex")
    })
}

fn title_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("static regex"))
}

fn alternatives(needles: &[&str]) -> String {
    needles
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|")
}

/// Every `<a href>` with its visible text.
pub fn anchors(html: &str) -> Vec<Anchor> {
    anchor_re()
        .captures_iter(html)
        .map(|caps| Anchor {
            href: decode_entities(caps[1].trim()),
            text: strip_html(&caps[2]),
        })
        .filter(|a| !a.href.is_empty())
        .collect()
}

/// Slices of markup for the repeated "card" among `tags` elements whose
/// class contains one of `needles`.
///
/// The card class is the most frequent matching class attribute (earliest
/// wins a tie), so inner elements such as `event-date` do not split a card.
/// Each block runs to the next card or the end of the document.
pub fn class_blocks<'h>(html: &'h str, tags: &[&str], needles: &[&str]) -> Vec<&'h str> {
    let pattern = format!(
        r#"(?is)<(?:{})\b[^>]*?\bclass\s*=\s*["']([^"']*(?:{})[^"']*)["'][^>]*>"#,
        alternatives(tags),
        alternatives(needles)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    let starts: Vec<(usize, String)> = re
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), caps[1].to_string()))
        })
        .collect();

    let mut card: Option<(&str, usize)> = None;
    for (_, class) in &starts {
        let count = starts.iter().filter(|(_, c)| c == class).count();
        if card.is_none_or(|(_, best)| count > best) {
            card = Some((class.as_str(), count));
        }
    }
    let Some((card_class, _)) = card else {
        return Vec::new();
    };

    let positions: Vec<usize> = starts
        .iter()
        .filter(|(_, c)| c == card_class)
        .map(|(pos, _)| *pos)
        .collect();

    positions
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let next = positions.get(i + 1).copied().unwrap_or(html.len());
            let mut end = next.min(start + MAX_BLOCK_BYTES);
            while !html.is_char_boundary(end) {
                end -= 1;
            }
            &html[start..end]
        })
        .collect()
}

/// Text of the first element whose class contains one of `needles`.
/// A `datetime` or `content` attribute on that element wins over its text.
pub fn class_text(fragment: &str, needles: &[&str]) -> Option<String> {
    let pattern = format!(
        r#"(?is)(<[a-z][a-z0-9]*\b[^>]*?\bclass\s*=\s*["'][^"']*(?:{})[^"']*["'][^>]*>)(.*?)</"#,
        alternatives(needles)
    );
    let re = Regex::new(&pattern).ok()?;
    for caps in re.captures_iter(fragment) {
        if let Some(attr) = datetime_attr_re()
            .captures(&caps[1])
            .map(|c| collapse_whitespace(&decode_entities(&c[1])))
            && !attr.is_empty()
        {
            return Some(attr);
        }
        let text = strip_html(&caps[2]);
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Text of the first `<h1>`..`<h4>`, optionally restricted to one level.
pub fn heading_text(fragment: &str, level: Option<u8>) -> Option<String> {
    heading_re()
        .captures_iter(fragment)
        .filter(|caps| level.is_none_or(|l| &caps[1] == l.to_string()))
        .map(|caps| strip_html(&caps[2]))
        .find(|t| !t.is_empty())
}

/// The `datetime` attribute of the first `<time>` element.
pub fn time_attr(fragment: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?is)<time\b[^>]*?\bdatetime\s*=\s*["']([^"']+)["']"#).expect("static regex")
    });
    re.captures(fragment).map(|c| c[1].trim().to_string())
}

/// `<meta property|name="…" content="…">`, in either attribute order.
pub fn meta_content(html: &str, name: &str) -> Option<String> {
    let name = regex::escape(name);
    let forward = format!(
        r#"(?is)<meta\b[^>]*?\b(?:property|name)\s*=\s*["']{}["'][^>]*?\bcontent\s*=\s*["']([^"']*)["']"#,
        name
    );
    let reverse = format!(
        r#"(?is)<meta\b[^>]*?\bcontent\s*=\s*["']([^"']*)["'][^>]*?\b(?:property|name)\s*=\s*["']{}["']"#,
        name
    );
    [forward, reverse]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .find_map(|re| re.captures(html).map(|c| collapse_whitespace(&decode_entities(&c[1]))))
        .filter(|s| !s.is_empty())
}

/// Text of the document `<title>`.
pub fn document_title(html: &str) -> Option<String> {
    title_tag_re()
        .captures(html)
        .map(|c| strip_html(&c[1]))
        .filter(|t| !t.is_empty())
}

fn is_event_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.ends_with("Event"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|s| s.ends_with("Event"))),
        _ => false,
    }
}

fn collect_events<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_events(v, out)),
        Value::Object(map) => {
            if is_event_type(value) {
                out.push(value);
            } else if let Some(graph) = map.get("@graph") {
                collect_events(graph, out);
            } else if let Some(items) = map.get("itemListElement") {
                collect_events(items, out);
            } else if let Some(item) = map.get("item") {
                collect_events(item, out);
            }
        }
        _ => {}
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    let raw = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

fn location_of(value: &Value) -> Option<String> {
    match value.get("location")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(|v| location_of_place(v)),
        place => location_of_place(place),
    }
}

fn location_of_place(place: &Value) -> Option<String> {
    if let Some(s) = place.as_str() {
        return Some(s.to_string());
    }
    let name = string_field(place, "name");
    let address = match place.get("address") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(addr @ Value::Object(_)) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "addressRegion"]
                .iter()
                .filter_map(|k| string_field(addr, k))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    };
    match (name, address) {
        (Some(n), Some(a)) if !a.contains(&n) => Some(format!("{}, {}", n, a)),
        (Some(n), _) => Some(n),
        (None, a) => a,
    }
}

fn cost_of(value: &Value) -> Option<String> {
    let offer = match value.get("offers")? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let price = string_field(offer, "price").or_else(|| string_field(offer, "lowPrice"))?;
    if price == "0" || price == "0.00" {
        return Some("Free".to_string());
    }
    if price.starts_with('$') {
        Some(price)
    } else {
        Some(format!("${}", price))
    }
}

/// schema.org `Event` objects embedded as JSON-LD.
pub fn json_ld_events(html: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    for caps in json_ld_re().captures_iter(html) {
        let Ok(doc) = serde_json::from_str::<Value>(caps[1].trim()) else {
            log::debug!("Skipping unparseable JSON-LD block");
            continue;
        };
        let mut found = Vec::new();
        collect_events(&doc, &mut found);
        for ev in found {
            let image = match ev.get("image") {
                Some(Value::Array(items)) => items.first().and_then(|v| v.as_str()).map(String::from),
                Some(Value::String(s)) => Some(s.clone()),
                _ => None,
            };
            records.push(RawRecord {
                title: string_field(ev, "name"),
                start: string_field(ev, "startDate"),
                end: string_field(ev, "endDate"),
                location: location_of(ev),
                link: string_field(ev, "url"),
                description: string_field(ev, "description"),
                cost: cost_of(ev),
                category: None,
                image,
            });
        }
    }
    records
}
