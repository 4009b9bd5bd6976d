mod ollama;

pub use ollama::OllamaClient;

use std::future::Future;

use crate::db::Repository;
use crate::error::Result;
use crate::hash::content_version;
use crate::models::{Post, SummaryMode};

/// Character budget for article text sent to the model. Cost control, not
/// a correctness concern.
const CLIP_LIMIT: usize = 12_000;

/// The external text-generation collaborator. One raw seam: callers build
/// prompts, implementations only run them.
pub trait LlmBackend {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Truncate to the clip limit without cutting a multibyte sequence.
pub fn clip_text(text: &str) -> &str {
    if text.len() <= CLIP_LIMIT {
        return text;
    }
    let mut end = CLIP_LIMIT;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub fn summary_prompt(mode: SummaryMode, title: &str, url: &str, text: &str) -> String {
    let instruction = match mode {
        SummaryMode::Short => "Write a TL;DR in 2-3 sentences. Be concrete and technical. No fluff.",
        SummaryMode::Bullets => {
            "Summarize into up to 5 bullet points. Each bullet must be one sentence. Be specific."
        }
        SummaryMode::Takeaways => {
            "Produce: (1) 3 key takeaways (bullets), (2) a 'Why it matters' paragraph (max 3 sentences), \
             (3) 1 suggested experiment/action to try."
        }
        SummaryMode::Comprehensive => {
            "Write a thorough summary in 4-6 paragraphs: the core argument, the supporting evidence, \
             and the tradeoffs or open problems. Be precise and technical."
        }
    };

    format!(
        "You summarize technical writing for a busy senior engineer. Be precise.\n\n\
         Title: {title}\nURL: {url}\n\n\
         {instruction}\n\n\
         Article text:\n{}\n",
        clip_text(text)
    )
}

#[derive(Debug)]
pub struct SummaryOutcome {
    pub text: String,
    pub cache_hit: bool,
}

/// Idempotent get-or-compute cache in front of the LLM, keyed by
/// (post, mode, model, content hash). A changed extraction changes the
/// hash, so stale summaries are simply never looked up again.
pub struct SummaryCache<'a, B: LlmBackend> {
    repo: &'a Repository,
    backend: &'a B,
    model: &'a str,
}

impl<'a, B: LlmBackend> SummaryCache<'a, B> {
    pub fn new(repo: &'a Repository, backend: &'a B, model: &'a str) -> Self {
        Self {
            repo,
            backend,
            model,
        }
    }

    pub async fn get_or_create(&self, post: &Post, mode: SummaryMode) -> Result<SummaryOutcome> {
        let content_hash = if post.content_hash.is_empty() {
            content_version(&post.content_text)
        } else {
            post.content_hash.clone()
        };

        if let Some(existing) = self
            .repo
            .get_summary(post.id, mode, self.model, &content_hash)
            .await?
        {
            return Ok(SummaryOutcome {
                text: existing.summary_text,
                cache_hit: true,
            });
        }

        let prompt = summary_prompt(mode, &post.title, &post.url, &post.content_text);
        let text = self.backend.generate(self.model, &prompt).await?;

        // Only a complete summary is ever stored; the insert is ignored if
        // a concurrent writer got there first.
        self.repo
            .insert_summary(post.id, mode, self.model, &content_hash, &text)
            .await?;

        Ok(SummaryOutcome {
            text,
            cache_hit: false,
        })
    }
}
