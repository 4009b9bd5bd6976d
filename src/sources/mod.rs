use regex::Regex;

use crate::db::Repository;
use crate::ingest::{FeedClient, FeedEntry, FeedMeta};
use crate::summarize::LlmBackend;

const MAX_ENTRY_TITLES: usize = 10;
const MAX_SNIPPETS: usize = 4;
const SNIPPET_CHARS: usize = 800;
const MAX_TAGS: usize = 5;

/// Outcome of one autofill pass. `None` fields mean "keep the stored
/// value"; warnings are reported but never fatal.
#[derive(Debug, Default)]
pub struct AutofillResult {
    pub name: Option<String>,
    pub tags: Option<String>,
    pub warnings: Vec<String>,
}

/// Best display name for a source: feed title, else the URL host, else
/// the URL itself.
pub fn infer_source_name(meta: &FeedMeta, url: &str) -> String {
    if !meta.title.trim().is_empty() {
        return meta.title.trim().to_string();
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Normalize raw model output into at most 5 lowercase hyphenated tags.
pub fn normalize_tags(raw: &str) -> Vec<String> {
    let split_re = Regex::new(r"[,\n;]+").expect("static regex");
    let non_tag_re = Regex::new(r"[^a-z0-9-]+").expect("static regex");
    let multi_hyphen_re = Regex::new(r"-{2,}").expect("static regex");

    let mut tags = Vec::new();
    for piece in split_re.split(raw) {
        let tag = piece.trim().to_lowercase().replace([' ', '_'], "-");
        let tag = non_tag_re.replace_all(&tag, "");
        let tag = multi_hyphen_re.replace_all(&tag, "-");
        let tag = tag.trim_matches('-').to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        if tags.len() >= MAX_TAGS {
            break;
        }
    }
    tags
}

fn tag_prompt(meta: &FeedMeta, entry_titles: &[String], snippets: &[String]) -> String {
    let titles = if entry_titles.is_empty() {
        "- (none)".to_string()
    } else {
        entry_titles
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let snippets = if snippets.is_empty() {
        "- (none)".to_string()
    } else {
        snippets
            .iter()
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "You generate concise tags for a technical RSS feed.\n\
         Return 3-5 tags, comma-separated.\n\
         Rules: lowercase, use hyphens instead of spaces, no more than 5 tags.\n\n\
         Feed title: {}\n\
         Feed subtitle: {}\n\n\
         Recent entry titles:\n{titles}\n\n\
         Content snippets:\n{snippets}\n",
        meta.title, meta.description,
    )
}

fn entry_titles(entries: &[FeedEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.title.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_ENTRY_TITLES)
        .collect()
}

/// Fill missing name/tags for a source from feed metadata and generated
/// tags. Only overwrites existing values with `force`.
#[allow(clippy::too_many_arguments)]
pub async fn autofill_source<B: LlmBackend>(
    repo: &Repository,
    feeds: &FeedClient,
    backend: &B,
    model: &str,
    source_id: Option<i64>,
    url: &str,
    name: &str,
    tags: &str,
    force: bool,
) -> AutofillResult {
    let mut result = AutofillResult::default();

    let want_name = force || name.is_empty() || name == url;
    let want_tags = force || tags.trim().is_empty();
    if !want_name && !want_tags {
        return result;
    }

    let (meta, entries) = match feeds.fetch_feed(url).await {
        Ok(parsed) => parsed,
        Err(e) => {
            result.warnings.push(format!("Failed to parse feed {url}: {e}"));
            return result;
        }
    };

    if want_name {
        let inferred = infer_source_name(&meta, url);
        if inferred != name {
            result.name = Some(inferred);
        }
    }

    if want_tags {
        let titles = entry_titles(&entries);
        let snippets = match source_id {
            Some(id) => repo
                .recent_content_snippets(id, MAX_SNIPPETS, SNIPPET_CHARS)
                .await
                .unwrap_or_default(),
            None => Vec::new(),
        };
        match backend.generate(model, &tag_prompt(&meta, &titles, &snippets)).await {
            Ok(raw) => {
                let generated = normalize_tags(&raw).join(",");
                if generated.is_empty() {
                    result.warnings.push(format!("No tags generated for {url}"));
                } else if generated != tags {
                    result.tags = Some(generated);
                }
            }
            Err(e) => {
                result
                    .warnings
                    .push(format!("Failed to generate tags for {url}: {e}"));
            }
        }
    }

    result
}
