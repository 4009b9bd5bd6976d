use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{NewPost, NewSource, Post, ReadState, Score, Source, Summary, SummaryMode};

use super::schema::SCHEMA;

/// Conjunctive filters applied when gathering ranking/digest candidates.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    /// Lower bound (RFC 3339) on `published_at`; `None` disables the window.
    pub since: Option<String>,
    /// Upper bound (RFC 3339) on `published_at`, the other end of the window.
    pub until: Option<String>,
    /// When false, only posts still in state `unread` are candidates.
    pub include_read: bool,
    pub source_ids: Vec<i64>,
    /// Matched case-insensitively against source name and source tags.
    pub tags: Vec<String>,
}

impl PostFilter {
    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(since) = &self.since {
            clauses.push("p.published_at >= ?".into());
            values.push(since.clone().into());
        }
        if let Some(until) = &self.until {
            clauses.push("p.published_at <= ?".into());
            values.push(until.clone().into());
        }
        if !self.include_read {
            clauses.push("p.read_state = 'unread'".into());
        }
        if !self.source_ids.is_empty() {
            let placeholders = vec!["?"; self.source_ids.len()].join(",");
            clauses.push(format!("p.source_id IN ({placeholders})"));
            values.extend(self.source_ids.iter().map(|id| Value::from(*id)));
        }
        let tag_terms: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if !tag_terms.is_empty() {
            let mut tag_clauses = Vec::new();
            for term in tag_terms {
                tag_clauses.push("(lower(s.name) LIKE ? OR lower(s.tags) LIKE ?)".to_string());
                let like = format!("%{term}%");
                values.push(like.clone().into());
                values.push(like.into());
            }
            clauses.push(format!("({})", tag_clauses.join(" OR ")));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (where_sql, values)
    }
}

/// A post joined with its source weight, ready for scoring.
#[derive(Debug, Clone)]
pub struct CandidatePost {
    pub post: Post,
    pub source_weight: f64,
}

/// A post joined with its current score, as returned by the ranked query.
#[derive(Debug, Clone)]
pub struct RankedPost {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub published_at: String,
    pub word_count: i64,
    pub read_state: ReadState,
    pub content_text: String,
    pub content_hash: String,
    pub score: f64,
    pub breakdown_json: String,
}

#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    pub async fn insert_source(&self, source: NewSource) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sources (name, url, type, weight, tags, enabled, created_at) \
                     VALUES (?1, ?2, 'rss', ?3, ?4, 1, ?5)",
                    params![
                        source.name,
                        source.url,
                        source.weight,
                        source.tags,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_all_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, url, type, weight, tags, enabled, created_at \
                     FROM sources ORDER BY id",
                )?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn get_enabled_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, url, type, weight, tags, enabled, created_at \
                     FROM sources WHERE enabled = 1 ORDER BY id",
                )?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    pub async fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let source = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, url, type, weight, tags, enabled, created_at \
                     FROM sources WHERE id = ?1",
                )?;
                let source = stmt.query_row(params![id], source_from_row).optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    /// Returns false when no such source exists.
    pub async fn set_source_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE sources SET enabled = ?1 WHERE id = ?2",
                    params![enabled, id],
                )?;
                Ok(n)
            })
            .await?;
        Ok(changed > 0)
    }

    /// Fill name/tags from autofill output; `None` keeps the stored value.
    pub async fn update_source_meta(
        &self,
        id: i64,
        name: Option<String>,
        tags: Option<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET name = COALESCE(?1, name), tags = COALESCE(?2, tags) \
                     WHERE id = ?3",
                    params![name, tags, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Post operations

    pub async fn post_url_exists(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM posts WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Insert-or-ignore keyed by URL: the first writer wins and a repeat
    /// insert is a no-op. Returns the new id, or `None` when skipped.
    pub async fn insert_post(&self, post: NewPost) -> Result<Option<i64>> {
        let id = self
            .conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO posts (source_id, title, url, author, published_at, fetched_at, \
                                        content_text, content_hash, word_count, read_state) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'unread') \
                     ON CONFLICT(url) DO NOTHING",
                    params![
                        post.source_id,
                        post.title,
                        post.url,
                        post.author,
                        post.published_at,
                        Utc::now().to_rfc3339(),
                        post.content_text,
                        post.content_hash,
                        post.word_count,
                    ],
                )?;
                if inserted == 0 {
                    Ok(None)
                } else {
                    Ok(Some(conn.last_insert_rowid()))
                }
            })
            .await?;
        Ok(id)
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source_id, title, url, author, published_at, fetched_at, \
                            content_text, content_hash, word_count, read_state \
                     FROM posts WHERE id = ?1",
                )?;
                let post = stmt.query_row(params![id], post_from_row).optional()?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    /// Returns false when no such post exists.
    pub async fn set_read_state(&self, id: i64, state: ReadState) -> Result<bool> {
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE posts SET read_state = ?1 WHERE id = ?2",
                    params![state.as_str(), id],
                )?;
                Ok(n)
            })
            .await?;
        Ok(changed > 0)
    }

    pub async fn count_posts(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn count_short_posts(&self, min_word_count: i64, source_ids: Vec<i64>) -> Result<i64> {
        let (where_sql, values) = short_post_where(min_word_count, &source_ids);
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM posts WHERE {where_sql}"),
                    params_from_iter(values),
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    /// Hygiene deletion of posts below the word-count threshold, with their
    /// dependent score/summary rows. The only post-delete path in the system.
    pub async fn purge_short_posts(&self, min_word_count: i64, source_ids: Vec<i64>) -> Result<usize> {
        let (where_sql, values) = short_post_where(min_word_count, &source_ids);
        let purged = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    &format!(
                        "DELETE FROM scores WHERE post_id IN (SELECT id FROM posts WHERE {where_sql})"
                    ),
                    params_from_iter(values.clone()),
                )?;
                tx.execute(
                    &format!(
                        "DELETE FROM summaries WHERE post_id IN (SELECT id FROM posts WHERE {where_sql})"
                    ),
                    params_from_iter(values.clone()),
                )?;
                let n = tx.execute(
                    &format!("DELETE FROM posts WHERE {where_sql}"),
                    params_from_iter(values),
                )?;
                tx.commit()?;
                Ok(n)
            })
            .await?;
        Ok(purged)
    }

    /// Recent post titles for a source, newest first. Used by autofill.
    pub async fn recent_post_titles(&self, source_id: i64, limit: usize) -> Result<Vec<String>> {
        let titles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT title FROM posts WHERE source_id = ?1 \
                     ORDER BY published_at DESC LIMIT ?2",
                )?;
                let titles = stmt
                    .query_map(params![source_id, limit as i64], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(titles)
            })
            .await?;
        Ok(titles)
    }

    /// Recent non-empty content snippets for a source, clipped per snippet.
    pub async fn recent_content_snippets(
        &self,
        source_id: i64,
        limit: usize,
        max_chars: usize,
    ) -> Result<Vec<String>> {
        let snippets = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT content_text FROM posts WHERE source_id = ?1 \
                     ORDER BY published_at DESC LIMIT ?2",
                )?;
                let texts = stmt
                    .query_map(params![source_id, limit as i64], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(texts)
            })
            .await?;
        Ok(snippets
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| clip_chars(&t, max_chars))
            .collect())
    }

    // Candidate queries for ranking and digest selection

    pub async fn get_candidates(&self, filter: &PostFilter) -> Result<Vec<CandidatePost>> {
        let (where_sql, values) = filter.to_sql();
        let candidates = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT p.id, p.source_id, p.title, p.url, p.author, p.published_at, \
                            p.fetched_at, p.content_text, p.content_hash, p.word_count, \
                            p.read_state, s.weight \
                     FROM posts p JOIN sources s ON p.source_id = s.id \
                     {where_sql} \
                     ORDER BY p.published_at DESC"
                ))?;
                let candidates = stmt
                    .query_map(params_from_iter(values), candidate_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(candidates)
            })
            .await?;
        Ok(candidates)
    }

    /// Candidates joined with their current score, ordered by score
    /// descending with post id as the deterministic tiebreak.
    pub async fn get_ranked(&self, filter: &PostFilter, limit: usize) -> Result<Vec<RankedPost>> {
        let (where_sql, mut values) = filter.to_sql();
        values.push(Value::from(limit as i64));
        let ranked = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT p.id, p.title, p.url, p.author, p.published_at, p.word_count, \
                            p.read_state, p.content_text, p.content_hash, \
                            sc.score, sc.breakdown_json \
                     FROM posts p \
                     JOIN scores sc ON p.id = sc.post_id \
                     JOIN sources s ON p.source_id = s.id \
                     {where_sql} \
                     ORDER BY sc.score DESC, p.id ASC \
                     LIMIT ?"
                ))?;
                let ranked = stmt
                    .query_map(params_from_iter(values), ranked_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ranked)
            })
            .await?;
        Ok(ranked)
    }

    // Score operations

    pub async fn has_score(&self, post_id: i64) -> Result<bool> {
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM scores WHERE post_id = ?1",
                    params![post_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn get_score(&self, post_id: i64) -> Result<Option<Score>> {
        let score = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT post_id, scored_at, score, breakdown_json \
                     FROM scores WHERE post_id = ?1",
                )?;
                let score = stmt.query_row(params![post_id], score_from_row).optional()?;
                Ok(score)
            })
            .await?;
        Ok(score)
    }

    /// Last-writer-wins: re-scoring overwrites, scores are not versioned.
    pub async fn upsert_score(
        &self,
        post_id: i64,
        score: f64,
        breakdown_json: String,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO scores (post_id, scored_at, score, breakdown_json) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(post_id) DO UPDATE SET \
                         scored_at = excluded.scored_at, \
                         score = excluded.score, \
                         breakdown_json = excluded.breakdown_json",
                    params![post_id, Utc::now().to_rfc3339(), score, breakdown_json],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Summary operations

    pub async fn get_summary(
        &self,
        post_id: i64,
        mode: SummaryMode,
        model: &str,
        content_hash: &str,
    ) -> Result<Option<Summary>> {
        let model = model.to_string();
        let content_hash = content_hash.to_string();
        let summary = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT post_id, mode, model, content_hash, summary_text, created_at \
                     FROM summaries \
                     WHERE post_id = ?1 AND mode = ?2 AND model = ?3 AND content_hash = ?4",
                )?;
                let summary = stmt
                    .query_row(
                        params![post_id, mode.as_str(), model, content_hash],
                        summary_from_row,
                    )
                    .optional()?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// First-writer-wins: a concurrent duplicate insert is a no-op, the
    /// composite primary key arbitrates.
    pub async fn insert_summary(
        &self,
        post_id: i64,
        mode: SummaryMode,
        model: &str,
        content_hash: &str,
        summary_text: &str,
    ) -> Result<()> {
        let model = model.to_string();
        let content_hash = content_hash.to_string();
        let summary_text = summary_text.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO summaries (post_id, mode, model, content_hash, summary_text, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(post_id, mode, model, content_hash) DO NOTHING",
                    params![
                        post_id,
                        mode.as_str(),
                        model,
                        content_hash,
                        summary_text,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn short_post_where(min_word_count: i64, source_ids: &[i64]) -> (String, Vec<Value>) {
    let mut where_sql = "word_count < ?".to_string();
    let mut values: Vec<Value> = vec![min_word_count.into()];
    if !source_ids.is_empty() {
        let placeholders = vec!["?"; source_ids.len()].join(",");
        where_sql.push_str(&format!(" AND source_id IN ({placeholders})"));
        values.extend(source_ids.iter().map(|id| Value::from(*id)));
    }
    (where_sql, values)
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        kind: row.get(3)?,
        weight: row.get(4)?,
        tags: row.get(5)?,
        enabled: row.get::<_, i64>(6)? != 0,
        created_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        author: row.get(4)?,
        published_at: row.get(5)?,
        fetched_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        content_text: row.get(7)?,
        content_hash: row.get(8)?,
        word_count: row.get(9)?,
        read_state: row
            .get::<_, String>(10)?
            .parse()
            .unwrap_or(ReadState::Unread),
    })
}

fn candidate_from_row(row: &Row) -> rusqlite::Result<CandidatePost> {
    Ok(CandidatePost {
        post: post_from_row(row)?,
        source_weight: row.get(11)?,
    })
}

fn ranked_from_row(row: &Row) -> rusqlite::Result<RankedPost> {
    Ok(RankedPost {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        author: row.get(3)?,
        published_at: row.get(4)?,
        word_count: row.get(5)?,
        read_state: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(ReadState::Unread),
        content_text: row.get(7)?,
        content_hash: row.get(8)?,
        score: row.get(9)?,
        breakdown_json: row.get(10)?,
    })
}

fn score_from_row(row: &Row) -> rusqlite::Result<Score> {
    Ok(Score {
        post_id: row.get(0)?,
        scored_at: row
            .get::<_, String>(1)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        score: row.get(2)?,
        breakdown_json: row.get(3)?,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<Summary> {
    let mode: String = row.get(1)?;
    Ok(Summary {
        post_id: row.get(0)?,
        mode: match mode.as_str() {
            "short" => SummaryMode::Short,
            "bullets" => SummaryMode::Bullets,
            "comprehensive" => SummaryMode::Comprehensive,
            _ => SummaryMode::Takeaways,
        },
        model: row.get(2)?,
        content_hash: row.get(3)?,
        summary_text: row.get(4)?,
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
