// File: ./src/fetch/mod.rs
//! Fetch adapters: per-kind retrieval and raw-record extraction.
//!
//! Every source is dispatched through an `AdapterRegistry`, a strategy map
//! keyed by `(kind, parser tag)` with one fallback per kind. Unknown parser
//! tags resolve to the fallback instead of failing.
pub mod api;
pub mod athletics;
pub mod calendar;
pub mod feed;
pub mod html;
pub mod middleware;
pub mod page;
pub mod redirect;
pub mod transport;

use crate::config::Config;
use crate::model::{RawRecord, Source, SourceKind};
use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use self::transport::HttpFetcher;

/// Shared, read-only state handed to every adapter call.
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub http: HttpFetcher,
    pub detail_timeout: Duration,
    pub max_detail_fetches: usize,
}

impl FetchContext {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::from_config(config)?,
            detail_timeout: config.detail_timeout(),
            max_detail_fetches: config.max_detail_fetches,
        })
    }
}

/// A leaf retrieval strategy. Implementations return every record they
/// could extract, or an error that the pipeline turns into a single
/// source-error record.
pub trait Adapter: Send + Sync {
    fn fetch<'a>(&'a self, source: &'a Source, ctx: &'a FetchContext) -> BoxFuture<'a, Result<Vec<RawRecord>>>;
}

pub(crate) fn endpoint_of(source: &Source) -> Result<&str> {
    source
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| anyhow!("Source '{}' has no endpoint", source.name))
}

pub struct AdapterRegistry {
    adapters: HashMap<(SourceKind, String), Arc<dyn Adapter>>,
    fallbacks: HashMap<SourceKind, Arc<dyn Adapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AdapterRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
            fallbacks: HashMap::new(),
        }
    }

    /// The built-in adapters for all four source kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();

        registry.set_fallback(SourceKind::Feed, Arc::new(feed::FeedAdapter));
        registry.register(SourceKind::Feed, "rss", Arc::new(feed::FeedAdapter));
        registry.register(SourceKind::Feed, "atom", Arc::new(feed::FeedAdapter));

        registry.set_fallback(SourceKind::Calendar, Arc::new(calendar::CalendarAdapter));
        registry.register(SourceKind::Calendar, "ics", Arc::new(calendar::CalendarAdapter));

        registry.set_fallback(SourceKind::Page, Arc::new(page::SimpleListAdapter));
        registry.register(SourceKind::Page, page::SIMPLE_LIST_TAG, Arc::new(page::SimpleListAdapter));
        registry.register(SourceKind::Page, page::BANDSINTOWN_TAG, Arc::new(page::BandsintownAdapter));
        registry.register(SourceKind::Page, page::VISIT_OXFORD_TAG, Arc::new(page::VisitOxfordAdapter));
        registry.register(SourceKind::Page, page::SOCIAL_TAG, Arc::new(page::SocialStubAdapter));
        registry.register(
            SourceKind::Page,
            athletics::OLEMISS_ATHLETICS_TAG,
            Arc::new(athletics::OleMissAthleticsAdapter),
        );

        registry.set_fallback(SourceKind::Api, Arc::new(api::JsonApiAdapter));
        registry.register(SourceKind::Api, api::JSON_TAG, Arc::new(api::JsonApiAdapter));
        registry.register(SourceKind::Api, api::SEATGEEK_TAG, Arc::new(api::SeatGeekAdapter));
        registry.register(SourceKind::Api, api::TICKETMASTER_TAG, Arc::new(api::TicketmasterAdapter));

        registry
    }

    pub fn register(&mut self, kind: SourceKind, tag: &str, adapter: Arc<dyn Adapter>) {
        self.adapters.insert((kind, tag.trim().to_lowercase()), adapter);
    }

    pub fn set_fallback(&mut self, kind: SourceKind, adapter: Arc<dyn Adapter>) {
        self.fallbacks.insert(kind, adapter);
    }

    /// Picks the adapter for `source`. Pages hosted on social networks go to
    /// the social stub whatever their tag.
    pub fn resolve(&self, source: &Source) -> Option<Arc<dyn Adapter>> {
        if source.kind == SourceKind::Page
            && source.endpoint_host().is_some_and(|h| page::is_social_host(&h))
            && let Some(stub) = self.adapters.get(&(SourceKind::Page, page::SOCIAL_TAG.to_string()))
        {
            return Some(stub.clone());
        }

        let tag = source.parser_tag();
        if let Some(adapter) = self.adapters.get(&(source.kind, tag.clone())) {
            return Some(adapter.clone());
        }
        if !tag.is_empty() {
            log::debug!(
                "No {} adapter for parser '{}' ({}), using fallback",
                source.kind,
                tag,
                source.name
            );
        }
        self.fallbacks.get(&source.kind).cloned()
    }
}
