use std::future::Future;

use feed_rs::model::Entry;
use feed_rs::parser;
use log::{debug, warn};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};

use crate::error::FeedError;
use crate::models::{FeedEntry, PollResult};

/// Anything that can be polled for the current list of feed entries.
pub trait FeedSource {
    fn poll(&self, cache_token: Option<&str>) -> impl Future<Output = Result<PollResult, FeedError>>;
}

/// Fetches one RSS/Atom feed over HTTP with conditional requests.
pub struct FeedFetcher {
    client: Client,
    url: String,
}

impl FeedFetcher {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FeedSource for FeedFetcher {
    async fn poll(&self, cache_token: Option<&str>) -> Result<PollResult, FeedError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = cache_token.filter(|t| !t.is_empty()) {
            request = request.header(IF_NONE_MATCH, token);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("{}: no update", self.url);
            return Ok(PollResult::Unchanged);
        }
        if !response.status().is_success() {
            return Err(FeedError::HttpStatus(response.status().as_u16()));
        }

        let cache_token = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let entries = parse_entries(&bytes[..])?;
        debug!("{}: {} entries, etag {:?}", self.url, entries.len(), cache_token);

        Ok(PollResult::Fresh { entries, cache_token })
    }
}

/// Parse a feed document into entries, keeping the document's order.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<FeedEntry>, FeedError> {
    let feed = parser::parse(bytes)?;
    Ok(feed.entries.into_iter().filter_map(convert_entry).collect())
}

fn convert_entry(entry: Entry) -> Option<FeedEntry> {
    let Some(published_at) = entry.published.or(entry.updated) else {
        warn!("Skipping entry {} without a publish date", entry.id);
        return None;
    };

    Some(FeedEntry {
        published_at,
        title: entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "(untitled)".to_string()),
        link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
        description: entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default(),
        tags: entry.categories.into_iter().map(|c| c.term).collect(),
    })
}
