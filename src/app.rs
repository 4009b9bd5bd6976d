use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db::{RankedPost, Repository};
use crate::digest::{window_filter, DigestSelector};
use crate::error::{AppError, Result};
use crate::ingest::{FeedClient, FeedEntry, FeedMeta, IngestCoordinator, IngestReport};
use crate::models::{NewSource, Post, ReadState, Source, SummaryMode};
use crate::sources::{autofill_source, AutofillResult};
use crate::summarize::{OllamaClient, SummaryCache, SummaryOutcome};

/// Minimum extracted characters before a post is worth summarizing.
const MIN_SUMMARY_CHARS: usize = 200;

pub struct RankOptions {
    pub window_hours: Option<i64>,
    pub top: Option<usize>,
    pub include_read: bool,
    pub source_ids: Vec<i64>,
    pub tags: Vec<String>,
}

pub struct DigestOptions {
    pub window_hours: Option<i64>,
    pub top: Option<usize>,
    pub budget_minutes: Option<u32>,
    pub auto_summarize: bool,
    pub source_ids: Vec<i64>,
    pub tags: Vec<String>,
}

pub struct App {
    pub config: Config,
    pub repo: Repository,
    feeds: FeedClient,
    llm: OllamaClient,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repo = Repository::new(&config.db_path).await?;
        let feeds = FeedClient::new();
        let llm = OllamaClient::new(config.llm_host.clone());
        Ok(Self {
            config,
            repo,
            feeds,
            llm,
        })
    }

    pub async fn fetch(&self, limit_per_source: usize) -> Result<IngestReport> {
        let coordinator =
            IngestCoordinator::new(&self.repo, &self.config.cache_dir, self.config.min_word_count);
        coordinator.run(limit_per_source).await
    }

    pub async fn rank(&self, now: DateTime<Utc>, opts: RankOptions) -> Result<Vec<RankedPost>> {
        let filter = window_filter(
            now,
            opts.window_hours,
            opts.include_read,
            opts.source_ids,
            opts.tags,
        );
        let selector = DigestSelector::new(&self.repo, &self.config.topics);
        selector
            .rank(now, &filter, opts.top.unwrap_or(self.config.default_top_n))
            .await
    }

    /// Ranked digest plus a cached one-line takeaway per selected post.
    /// Summarization failures degrade to an empty line, never a failed
    /// digest.
    pub async fn digest(
        &self,
        now: DateTime<Utc>,
        opts: DigestOptions,
    ) -> Result<Vec<(RankedPost, String)>> {
        let filter = window_filter(now, opts.window_hours, false, opts.source_ids, opts.tags);
        let selector = DigestSelector::new(&self.repo, &self.config.topics);
        let selected = selector
            .digest(
                now,
                &filter,
                opts.top.unwrap_or(self.config.default_top_n),
                opts.budget_minutes,
            )
            .await?;

        let cache = SummaryCache::new(&self.repo, &self.llm, &self.config.llm_model);
        let mut items = Vec::with_capacity(selected.len());
        for ranked in selected {
            let one_liner = if opts.auto_summarize && !ranked.content_text.is_empty() {
                match self.repo.get_post(ranked.id).await? {
                    Some(post) => match cache.get_or_create(&post, SummaryMode::Short).await {
                        Ok(outcome) => first_line(&outcome.text),
                        Err(e) => {
                            tracing::warn!(post_id = ranked.id, "summary skipped: {e}");
                            String::new()
                        }
                    },
                    None => String::new(),
                }
            } else {
                String::new()
            };
            items.push((ranked, one_liner));
        }
        Ok(items)
    }

    pub async fn summarize_post(
        &self,
        post_id: i64,
        mode: SummaryMode,
    ) -> Result<(Post, SummaryOutcome)> {
        let post = self
            .repo
            .get_post(post_id)
            .await?
            .ok_or(AppError::PostNotFound(post_id))?;

        if post.content_text.len() < MIN_SUMMARY_CHARS {
            return Err(anyhow::anyhow!(
                "Not enough extracted text to summarize. Try `techread open {post_id}`."
            )
            .into());
        }

        let cache = SummaryCache::new(&self.repo, &self.llm, &self.config.llm_model);
        let outcome = cache.get_or_create(&post, mode).await?;
        Ok((post, outcome))
    }

    pub async fn open_post(&self, post_id: i64) -> Result<String> {
        let post = self
            .repo
            .get_post(post_id)
            .await?
            .ok_or(AppError::PostNotFound(post_id))?;
        open::that(&post.url)?;
        Ok(post.url)
    }

    pub async fn mark_post(&self, post_id: i64, state: ReadState) -> Result<()> {
        if !self.repo.set_read_state(post_id, state).await? {
            return Err(AppError::PostNotFound(post_id));
        }
        Ok(())
    }

    // Source management

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        self.repo.get_all_sources().await
    }

    /// Register a source; missing name/tags are autofilled from the feed
    /// before insert. Warnings are returned for display.
    pub async fn add_source(
        &self,
        url: String,
        name: Option<String>,
        weight: f64,
        tags: String,
    ) -> Result<(String, Vec<String>)> {
        let mut final_name = name.clone().unwrap_or_else(|| url.clone());
        let mut final_tags = tags.clone();
        let mut warnings = Vec::new();

        if name.is_none() || tags.trim().is_empty() {
            let result = autofill_source(
                &self.repo,
                &self.feeds,
                &self.llm,
                &self.config.llm_model,
                None,
                &url,
                &final_name,
                &final_tags,
                false,
            )
            .await;
            if let Some(n) = result.name {
                final_name = n;
            }
            if let Some(t) = result.tags {
                final_tags = t;
            }
            warnings = result.warnings;
        }

        self.repo
            .insert_source(NewSource {
                name: final_name.clone(),
                url,
                weight,
                tags: final_tags,
            })
            .await?;
        Ok((final_name, warnings))
    }

    pub async fn set_source_enabled(&self, source_id: i64, enabled: bool) -> Result<()> {
        if !self.repo.set_source_enabled(source_id, enabled).await? {
            return Err(AppError::SourceNotFound(source_id));
        }
        Ok(())
    }

    pub async fn count_purgeable(&self, source_ids: Vec<i64>) -> Result<i64> {
        self.repo
            .count_short_posts(self.config.min_word_count, source_ids)
            .await
    }

    pub async fn purge_short_posts(&self, source_ids: Vec<i64>) -> Result<usize> {
        self.repo
            .purge_short_posts(self.config.min_word_count, source_ids)
            .await
    }

    pub async fn test_feed(&self, url: &str) -> Result<(FeedMeta, Vec<FeedEntry>)> {
        self.feeds.fetch_feed(url).await
    }

    /// Autofill one source or all of them; returns the update count and
    /// accumulated warnings.
    pub async fn autofill_sources(
        &self,
        source_id: Option<i64>,
        force: bool,
    ) -> Result<(usize, Vec<String>)> {
        let sources = match source_id {
            Some(id) => vec![self
                .repo
                .get_source(id)
                .await?
                .ok_or(AppError::SourceNotFound(id))?],
            None => self.repo.get_all_sources().await?,
        };

        let mut updated = 0;
        let mut warnings = Vec::new();
        for source in sources {
            let AutofillResult {
                name,
                tags,
                warnings: mut source_warnings,
            } = autofill_source(
                &self.repo,
                &self.feeds,
                &self.llm,
                &self.config.llm_model,
                Some(source.id),
                &source.url,
                &source.name,
                &source.tags,
                force,
            )
            .await;
            warnings.append(&mut source_warnings);
            if name.is_none() && tags.is_none() {
                continue;
            }
            self.repo.update_source_meta(source.id, name, tags).await?;
            updated += 1;
        }
        Ok((updated, warnings))
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim().to_string()
}
