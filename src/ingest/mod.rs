mod extract;
mod feed;
mod fetch;

pub use extract::{extract_text, normalize_whitespace, Extracted};
pub use feed::{dedupe_entries, FeedClient, FeedEntry, FeedMeta};
pub use fetch::{CachedFetcher, FetchOutcome};

use std::path::PathBuf;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::db::Repository;
use crate::error::Result;
use crate::hash::content_version;
use crate::models::{NewPost, Source};

/// Concurrent per-source pipelines; entries within one source stay
/// sequential out of politeness toward the remote host.
const SOURCE_CONCURRENCY: usize = 4;

#[derive(Debug, Default)]
pub struct SourceReport {
    pub source_id: i64,
    pub source_name: String,
    pub new_posts: usize,
    pub skipped: usize,
    pub fetch_failures: usize,
    pub feed_failed: bool,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub new_posts: usize,
    pub sources_failed: usize,
    pub sources: Vec<SourceReport>,
}

/// Walks enabled sources and runs each one's fetch pipeline in isolation:
/// a failure inside one source is logged and counted, never propagated.
pub struct IngestCoordinator<'a> {
    repo: &'a Repository,
    feeds: FeedClient,
    fetcher: CachedFetcher,
    min_word_count: i64,
    invalid_log: PathBuf,
}

impl<'a> IngestCoordinator<'a> {
    pub fn new(repo: &'a Repository, cache_dir: impl Into<PathBuf>, min_word_count: i64) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            repo,
            feeds: FeedClient::new(),
            fetcher: CachedFetcher::new(cache_dir.clone()),
            min_word_count,
            invalid_log: cache_dir.join("invalid_posts.log"),
        }
    }

    /// Fetch new posts from every enabled source. Re-running against
    /// unchanged feeds inserts nothing (dedupe by post URL).
    pub async fn run(&self, limit_per_source: usize) -> Result<IngestReport> {
        let sources = self.repo.get_enabled_sources().await?;

        let reports: Vec<SourceReport> = stream::iter(sources)
            .map(|source| self.ingest_source(source, limit_per_source))
            .buffer_unordered(SOURCE_CONCURRENCY)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for r in reports {
            report.new_posts += r.new_posts;
            if r.feed_failed {
                report.sources_failed += 1;
            }
            report.sources.push(r);
        }
        report.sources.sort_by_key(|r| r.source_id);
        Ok(report)
    }

    async fn ingest_source(&self, source: Source, limit_per_source: usize) -> SourceReport {
        tracing::info!(source = %source.name, url = %source.url, "fetching feed");
        let entries = match self.feeds.fetch_feed(&source.url).await {
            Ok((_, entries)) => entries,
            Err(e) => {
                tracing::warn!(source = %source.name, "failed to parse feed: {e}");
                return SourceReport {
                    source_id: source.id,
                    source_name: source.name,
                    feed_failed: true,
                    ..Default::default()
                };
            }
        };

        let limited: Vec<FeedEntry> = entries.into_iter().take(limit_per_source.max(1)).collect();
        self.ingest_entries(&source, limited).await
    }

    /// Run the per-entry pipeline for one source: dedupe against stored
    /// posts, fetch and extract, then insert. Failures downgrade to a
    /// partial-success insert so the post stays discoverable.
    pub async fn ingest_entries(&self, source: &Source, entries: Vec<FeedEntry>) -> SourceReport {
        let mut report = SourceReport {
            source_id: source.id,
            source_name: source.name.clone(),
            ..Default::default()
        };

        for entry in entries {
            if entry.url.is_empty() {
                continue;
            }
            match self.ingest_entry(source, &entry).await {
                Ok(EntryOutcome::Inserted) => report.new_posts += 1,
                Ok(EntryOutcome::Skipped) => report.skipped += 1,
                Ok(EntryOutcome::FailedButInserted) => {
                    report.new_posts += 1;
                    report.fetch_failures += 1;
                }
                Err(e) => {
                    // Store-level failure for one entry; keep going.
                    tracing::warn!(url = %entry.url, "could not store entry: {e}");
                    report.fetch_failures += 1;
                }
            }
        }
        report
    }

    async fn ingest_entry(&self, source: &Source, entry: &FeedEntry) -> Result<EntryOutcome> {
        if self.repo.post_url_exists(&entry.url).await? {
            return Ok(EntryOutcome::Skipped);
        }

        let published_at = entry.published.unwrap_or_else(Utc::now).to_rfc3339();

        let (extracted, fetch_failed) = match self.fetcher.fetch_html(&entry.url).await {
            Ok(outcome) => (extract_text(&outcome.html), false),
            Err(e) => {
                tracing::warn!(url = %entry.url, "could not fetch/extract: {e}");
                (Extracted::empty(), true)
            }
        };

        if !extracted.is_empty() && extracted.word_count < self.min_word_count {
            self.log_invalid_post(source, entry, extracted.word_count);
            return Ok(EntryOutcome::Skipped);
        }

        let content_hash = if extracted.is_empty() {
            String::new()
        } else {
            content_version(&extracted.text)
        };

        let inserted = self
            .repo
            .insert_post(NewPost {
                source_id: source.id,
                title: entry.title.clone(),
                url: entry.url.clone(),
                author: entry.author.clone(),
                published_at,
                word_count: extracted.word_count,
                content_text: extracted.text,
                content_hash,
            })
            .await?;

        match inserted {
            None => Ok(EntryOutcome::Skipped),
            Some(_) if fetch_failed => Ok(EntryOutcome::FailedButInserted),
            Some(_) => Ok(EntryOutcome::Inserted),
        }
    }

    /// Append a line to `<cache_dir>/invalid_posts.log`. Failures to log
    /// never fail the run.
    fn log_invalid_post(&self, source: &Source, entry: &FeedEntry, word_count: i64) {
        let title = entry.title.replace('\n', " ");
        let line = format!(
            "{}\tsource_id={}\tsource={}\turl={}\ttitle={}\tword_count={}\treason=below_min_word_count({})\n",
            Utc::now().to_rfc3339(),
            source.id,
            source.name,
            entry.url,
            title.trim(),
            word_count,
            self.min_word_count,
        );
        tracing::debug!(url = %entry.url, word_count, "skipping short post");
        if let Some(parent) = self.invalid_log.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = append_line(&self.invalid_log, &line) {
            tracing::debug!("could not write invalid post log: {e}");
        }
    }
}

enum EntryOutcome {
    Inserted,
    FailedButInserted,
    Skipped,
}

fn append_line(path: &std::path::Path, line: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())
}
