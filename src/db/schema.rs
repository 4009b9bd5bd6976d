pub const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;

-- sources table
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL DEFAULT 'rss',
    weight REAL NOT NULL DEFAULT 1.0,
    tags TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- posts table
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    author TEXT NOT NULL DEFAULT '',
    published_at TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    content_text TEXT NOT NULL DEFAULT '',
    content_hash TEXT NOT NULL DEFAULT '',
    word_count INTEGER NOT NULL DEFAULT 0,
    read_state TEXT NOT NULL DEFAULT 'unread'
);

CREATE INDEX IF NOT EXISTS idx_posts_published_at ON posts(published_at);
CREATE INDEX IF NOT EXISTS idx_posts_read_state ON posts(read_state);
CREATE INDEX IF NOT EXISTS idx_posts_source_id ON posts(source_id);

-- scores table: at most one live score per post
CREATE TABLE IF NOT EXISTS scores (
    post_id INTEGER PRIMARY KEY REFERENCES posts(id),
    scored_at TEXT NOT NULL,
    score REAL NOT NULL,
    breakdown_json TEXT NOT NULL
);

-- summaries table: keyed by (post, mode, model, content_hash) so a new
-- extraction orphans old rows instead of needing explicit invalidation
CREATE TABLE IF NOT EXISTS summaries (
    post_id INTEGER NOT NULL REFERENCES posts(id),
    mode TEXT NOT NULL,
    model TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (post_id, mode, model, content_hash)
);
"#;
