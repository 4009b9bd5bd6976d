use sha2::{Digest, Sha256};

/// Lowercase-hex SHA-256 of the input. Stable across runs and platforms.
pub fn stable_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for a fetched URL: the on-disk filename of its raw HTML.
pub fn cache_key(url: &str) -> String {
    stable_hash(url)
}

/// Content-version digest of extracted text. The summary cache is keyed by
/// this, so a changed extraction silently orphans stale summaries.
pub fn content_version(text: &str) -> String {
    stable_hash(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_vectors() {
        assert_eq!(
            stable_hash("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        // Empty input hashes to a well-defined digest, not an error.
        assert_eq!(
            stable_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn stable_across_calls() {
        let url = "https://example.com/posts/1?ref=feed";
        assert_eq!(cache_key(url), cache_key(url));
        assert_eq!(cache_key(url).len(), 64);
    }

    #[test]
    fn near_identical_urls_do_not_collide() {
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            let digest = cache_key(&format!("https://example.com/post/{i}"));
            assert!(seen.insert(digest), "collision at url {i}");
        }
    }

    #[test]
    fn one_character_difference_changes_digest() {
        assert_ne!(
            cache_key("https://example.com/a"),
            cache_key("https://example.com/b")
        );
    }
}
