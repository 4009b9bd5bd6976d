use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;

use crate::error::Result;
use crate::hash::cache_key;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "techread/0.1";

/// Politeness delay after each network fetch.
const FETCH_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct FetchOutcome {
    pub html: String,
    pub cache_hit: bool,
}

/// HTTP fetcher with a content-addressed disk cache: raw HTML lands at
/// `<cache_dir>/html/<cache_key(url)>.html` and a cache hit never touches
/// the network.
pub struct CachedFetcher {
    client: Client,
    cache_dir: PathBuf,
}

impl CachedFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir
            .join("html")
            .join(format!("{}.html", cache_key(url)))
    }

    pub async fn fetch_html(&self, url: &str) -> Result<FetchOutcome> {
        let path = self.cache_path(url);
        if path.exists() {
            let html = std::fs::read_to_string(&path)?;
            return Ok(FetchOutcome {
                html,
                cache_hit: true,
            });
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(
                anyhow::anyhow!("Failed to fetch {}: HTTP {}", url, response.status()).into(),
            );
        }
        let html = response.text().await?;

        write_cache(&path, &html)?;
        tokio::time::sleep(FETCH_DELAY).await;

        Ok(FetchOutcome {
            html,
            cache_hit: false,
        })
    }
}

fn write_cache(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}
