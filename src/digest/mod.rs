use chrono::{DateTime, Duration, Utc};

use crate::db::{PostFilter, RankedPost, Repository};
use crate::error::Result;
use crate::rank::score_post;

/// Assumed reading speed, words per minute.
const WORDS_PER_MINUTE: f64 = 220.0;

/// Oversampling factor applied before budget selection, so that dropping
/// long top-scored items still leaves enough candidates to fill `top_n`.
const OVERSAMPLE: usize = 3;

pub fn reading_minutes(word_count: i64) -> u32 {
    ((word_count.max(0) as f64 / WORDS_PER_MINUTE).round() as u32).max(1)
}

/// Build the candidate filter for a ranking/digest window ending at `now`.
pub fn window_filter(
    now: DateTime<Utc>,
    window_hours: Option<i64>,
    include_read: bool,
    source_ids: Vec<i64>,
    tags: Vec<String>,
) -> PostFilter {
    PostFilter {
        since: window_hours.map(|h| (now - Duration::hours(h.max(1))).to_rfc3339()),
        until: window_hours.map(|_| now.to_rfc3339()),
        include_read,
        source_ids,
        tags,
    }
}

/// Ranking, filtering, and budget-constrained selection over stored posts.
/// Holds its inputs explicitly; nothing is read from ambient state.
pub struct DigestSelector<'a> {
    repo: &'a Repository,
    topics: &'a [String],
}

impl<'a> DigestSelector<'a> {
    pub fn new(repo: &'a Repository, topics: &'a [String]) -> Self {
        Self { repo, topics }
    }

    /// Score candidates and persist via upsert. With `refresh` every
    /// candidate is recomputed; otherwise only posts lacking a current
    /// score are filled in. Re-running is idempotent either way.
    pub async fn ensure_scored(
        &self,
        now: DateTime<Utc>,
        filter: &PostFilter,
        refresh: bool,
    ) -> Result<usize> {
        let candidates = self.repo.get_candidates(filter).await?;
        let mut scored = 0;
        for candidate in candidates {
            let post = &candidate.post;
            if !refresh && self.repo.has_score(post.id).await? {
                continue;
            }
            let published = match parse_published(&post.published_at) {
                Some(dt) => dt,
                None => {
                    // Malformed publish timestamp is non-fatal for one post:
                    // rank it by fetch time instead.
                    tracing::warn!(
                        post_id = post.id,
                        published_at = %post.published_at,
                        "unparseable published_at, ranking by fetched_at"
                    );
                    post.fetched_at
                }
            };
            let result = score_post(
                now,
                published,
                candidate.source_weight,
                &post.title,
                &post.content_text,
                post.word_count,
                self.topics,
            );
            let breakdown_json = serde_json::to_string(&result.breakdown)?;
            self.repo
                .upsert_score(post.id, result.score, breakdown_json)
                .await?;
            scored += 1;
        }
        Ok(scored)
    }

    /// Rank: recompute every candidate score, then return the top `top_n`
    /// by score descending (ties broken by post id ascending).
    pub async fn rank(
        &self,
        now: DateTime<Utc>,
        filter: &PostFilter,
        top_n: usize,
    ) -> Result<Vec<RankedPost>> {
        let top_n = top_n.max(1);
        self.ensure_scored(now, filter, true).await?;
        self.repo.get_ranked(filter, top_n).await
    }

    /// Digest: fill in missing scores, oversample `top_n * 3` candidates,
    /// then either truncate to `top_n` or run greedy budget selection.
    pub async fn digest(
        &self,
        now: DateTime<Utc>,
        filter: &PostFilter,
        top_n: usize,
        budget_minutes: Option<u32>,
    ) -> Result<Vec<RankedPost>> {
        let top_n = top_n.max(1);
        self.ensure_scored(now, filter, false).await?;
        let ranked = self.repo.get_ranked(filter, top_n * OVERSAMPLE).await?;

        let selected = match budget_minutes {
            Some(budget) if budget > 0 => apply_time_budget(ranked, budget, top_n),
            _ => ranked.into_iter().take(top_n).collect(),
        };
        Ok(selected)
    }
}

/// Greedy value-density selection: highest `score / minutes` first, ties
/// by higher raw score then post id ascending. An item only enters the
/// result if it fits the remaining budget, so the selected total never
/// exceeds it; this is an approximation, not an optimal knapsack solve.
pub fn apply_time_budget(
    ranked: Vec<RankedPost>,
    budget_minutes: u32,
    top_n: usize,
) -> Vec<RankedPost> {
    let mut items: Vec<(f64, u32, RankedPost)> = ranked
        .into_iter()
        .map(|post| {
            let minutes = reading_minutes(post.word_count);
            (post.score / minutes as f64, minutes, post)
        })
        .collect();

    items.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then(b.2.score.total_cmp(&a.2.score))
            .then(a.2.id.cmp(&b.2.id))
    });

    let mut chosen = Vec::new();
    let mut remaining = budget_minutes;
    for (_, minutes, post) in items {
        if minutes <= remaining {
            remaining -= minutes;
            chosen.push(post);
        }
        if remaining == 0 || chosen.len() >= top_n {
            break;
        }
    }
    chosen
}

/// Parse a stored publish timestamp. Feed dates are normalized to RFC 3339
/// at ingest, but older rows may carry feed-native or SQLite formats.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}
