use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::Result;

/// One entry as the feed reports it, before any fetching or extraction.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub author: String,
    pub published: Option<DateTime<Utc>>,
}

/// Feed-level metadata, used for source autofill and `sources test`.
#[derive(Debug, Clone, Default)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
}

pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("techread/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch and parse a feed into metadata plus a deduplicated, finite
    /// entry list.
    pub async fn fetch_feed(&self, url: &str) -> Result<(FeedMeta, Vec<FeedEntry>)> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(
                anyhow::anyhow!("Failed to fetch feed {}: HTTP {}", url, response.status()).into(),
            );
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        let meta = FeedMeta {
            title: feed.title.map(|t| t.content).unwrap_or_default(),
            description: feed.description.map(|d| d.content).unwrap_or_default(),
        };

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| {
                let url = entry
                    .links
                    .first()
                    .map(|l| l.href.trim().to_string())
                    .unwrap_or_default();
                FeedEntry {
                    title: entry
                        .title
                        .map(|t| t.content.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| url.clone()),
                    url,
                    author: entry
                        .authors
                        .first()
                        .map(|a| a.name.trim().to_string())
                        .unwrap_or_default(),
                    published: entry.published.or(entry.updated),
                }
            })
            .collect();

        Ok((meta, dedupe_entries(entries)))
    }
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop entries without a URL and repeated URLs, preserving feed order.
pub fn dedupe_entries(entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.url.is_empty() && seen.insert(e.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> FeedEntry {
        FeedEntry {
            title: format!("entry {url}"),
            url: url.to_string(),
            author: String::new(),
            published: None,
        }
    }

    #[test]
    fn dedupe_preserves_first_occurrence_order() {
        let entries = vec![
            entry("https://a.example/1"),
            entry("https://a.example/2"),
            entry("https://a.example/1"),
            entry("https://a.example/3"),
        ];
        let out = dedupe_entries(entries);
        let urls: Vec<&str> = out.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.example/1",
                "https://a.example/2",
                "https://a.example/3"
            ]
        );
    }

    #[test]
    fn entries_without_urls_are_dropped() {
        let entries = vec![entry(""), entry("https://a.example/1")];
        assert_eq!(dedupe_entries(entries).len(), 1);
    }
}
