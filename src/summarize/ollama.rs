use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::LlmBackend;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for a local Ollama-compatible generation endpoint.
pub struct OllamaClient {
    client: Client,
    host: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        }
    }
}

impl LlmBackend for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.host))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AppError::LlmUnavailable(format!("{} ({e})", self.host))
                } else {
                    AppError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response.unwrap_or_default().trim().to_string())
    }
}
