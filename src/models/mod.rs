use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A feed definition. The URL uniquely identifies a source; disabling is
/// the soft-delete path, sources are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub kind: String,
    pub weight: f64,
    pub tags: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub weight: f64,
    pub tags: String,
}

/// One article. The URL uniquely identifies a post independent of source.
/// `content_hash` is empty exactly when `content_text` is empty, and
/// `word_count` is 0 in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub published_at: String,
    pub fetched_at: DateTime<Utc>,
    pub content_text: String,
    pub content_hash: String,
    pub word_count: i64,
    pub read_state: ReadState,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub published_at: String,
    pub content_text: String,
    pub content_hash: String,
    pub word_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadState {
    Unread,
    Read,
    Saved,
    Skip,
}

impl ReadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadState::Unread => "unread",
            ReadState::Read => "read",
            ReadState::Saved => "saved",
            ReadState::Skip => "skip",
        }
    }
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unread" => Ok(ReadState::Unread),
            "read" => Ok(ReadState::Read),
            "saved" => Ok(ReadState::Saved),
            "skip" => Ok(ReadState::Skip),
            other => Err(format!("unknown read state: {other}")),
        }
    }
}

/// Summary flavor. A closed set, validated at the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    Short,
    Bullets,
    Takeaways,
    Comprehensive,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMode::Short => "short",
            SummaryMode::Bullets => "bullets",
            SummaryMode::Takeaways => "takeaways",
            SummaryMode::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for SummaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one live score per post; re-scoring overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub post_id: i64,
    pub scored_at: DateTime<Utc>,
    pub score: f64,
    pub breakdown_json: String,
}

/// A cached natural-language artifact, addressed by
/// (post, mode, model, content_hash). Never mutated, never auto-deleted;
/// a changed content hash simply makes old rows unreachable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub post_id: i64,
    pub mode: SummaryMode,
    pub model: String,
    pub content_hash: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_state_round_trips_through_str() {
        for state in [
            ReadState::Unread,
            ReadState::Read,
            ReadState::Saved,
            ReadState::Skip,
        ] {
            assert_eq!(state.as_str().parse::<ReadState>().unwrap(), state);
        }
    }

    #[test]
    fn read_state_rejects_free_strings() {
        assert!("starred".parse::<ReadState>().is_err());
        assert!("".parse::<ReadState>().is_err());
    }
}
