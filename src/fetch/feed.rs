// File: ./src/fetch/feed.rs
//! RSS 2.0 and Atom feeds.
use crate::fetch::{Adapter, FetchContext, endpoint_of};
use crate::model::{RawRecord, Source};
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use roxmltree::{Document, Node, ParsingOptions};

/// Entries read from a single feed document.
pub const MAX_FEED_ITEMS: usize = 50;

const DATE_FIELDS: &[&str] = &["startdate", "start", "pubdate", "published", "updated", "date"];
const BODY_FIELDS: &[&str] = &["description", "summary", "encoded", "content"];

fn all_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// First child (by local name, case-insensitive) from `names`, honoring the
/// order of `names`.
fn child_text(entry: Node, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        entry
            .children()
            .filter(|c| c.is_element())
            .find(|c| c.tag_name().name().eq_ignore_ascii_case(name))
            .map(all_text)
            .filter(|t| !t.is_empty())
    })
}

fn atom_link(entry: Node) -> Option<String> {
    let links: Vec<Node> = entry
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "link")
        .collect();
    links
        .iter()
        .find(|l| matches!(l.attribute("rel"), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.attribute("href"))
        .map(|h| h.trim().to_string())
}

fn record_from_entry(entry: Node) -> RawRecord {
    let link = atom_link(entry).or_else(|| child_text(entry, &["link", "guid"]));
    RawRecord {
        title: child_text(entry, &["title"]),
        start: child_text(entry, DATE_FIELDS),
        end: child_text(entry, &["enddate", "end"]),
        location: child_text(entry, &["location"]),
        link,
        description: child_text(entry, BODY_FIELDS),
        cost: None,
        category: None,
        image: None,
    }
}

/// Parses RSS `<item>` or Atom `<entry>` elements, capped at
/// [`MAX_FEED_ITEMS`].
pub fn parse_feed(xml: &str) -> Result<Vec<RawRecord>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options).context("Invalid feed XML")?;

    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "item" | "entry"))
        .take(MAX_FEED_ITEMS)
        .map(record_from_entry)
        .collect())
}

pub struct FeedAdapter;

impl Adapter for FeedAdapter {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>> {
        Box::pin(async move {
            let url = endpoint_of(source)?;
            let body = ctx.http.get_text(url).await?;
            let records = parse_feed(&body).with_context(|| format!("Feed {}", url))?;
            log::debug!("{}: {} feed entries", source.name, records.len());
            Ok(records)
        })
    }
}
