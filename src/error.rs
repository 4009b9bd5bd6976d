use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    /// The local model service could not be reached at all. Kept separate
    /// from other LLM failures so the CLI can tell the user to start it.
    #[error("summarization service unreachable: {0}")]
    LlmUnavailable(String),

    #[error("summarization failed: {0}")]
    Llm(String),

    #[error("no such post: {0}")]
    PostNotFound(i64),

    #[error("no such source: {0}")]
    SourceNotFound(i64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
