use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Keywords the scorer matches against title and body.
    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    #[serde(default = "default_min_word_count")]
    pub min_word_count: i64,

    #[serde(default = "default_llm_host")]
    pub llm_host: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,
}

fn default_db_path() -> String {
    data_dir().join("techread.db").to_string_lossy().to_string()
}

fn default_cache_dir() -> String {
    data_dir().join("cache").to_string_lossy().to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("techread")
}

fn default_top_n() -> usize {
    10
}

fn default_min_word_count() -> i64 {
    500
}

fn default_llm_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "mistral-small-3.2".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_dir: default_cache_dir(),
            topics: Vec::new(),
            default_top_n: default_top_n(),
            min_word_count: default_min_word_count(),
            llm_host: default_llm_host(),
            llm_model: default_llm_model(),
        }
    }
}

impl Config {
    /// Load the config file, creating it with defaults on first run.
    /// Setup mistakes surface here, before any pipeline work begins.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| AppError::Config(format!("{}: {e}", config_path.display())))?;
            config
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("techread")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.default_top_n == 0 {
            return Err(AppError::Config("default_top_n must be at least 1".into()));
        }
        if self.min_word_count < 0 {
            return Err(AppError::Config("min_word_count must not be negative".into()));
        }
        if self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::Config("topics must not contain blank entries".into()));
        }
        Ok(())
    }
}
