/// Result of readable-text extraction. `word_count` is 0 exactly when
/// `text` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub word_count: i64,
}

impl Extracted {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            word_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Collapse all whitespace runs to single spaces and trim. Keeps the
/// content hash stable across cosmetic markup changes.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract readable plain text from HTML. Malformed input is a valid,
/// empty outcome — this never errors.
pub fn extract_text(html: &str) -> Extracted {
    let text = match html2text::from_read(html.as_bytes(), 80) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("failed to convert HTML to text: {e}");
            return Extracted::empty();
        }
    };

    let text = normalize_whitespace(&text);
    let word_count = if text.is_empty() {
        0
    } else {
        text.split(' ').count() as i64
    };
    Extracted { text, word_count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_words_from_simple_html() {
        let out = extract_text("<html><body><p>Hello brave new world</p></body></html>");
        assert!(out.text.contains("Hello brave new world"));
        assert_eq!(out.word_count, 4);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let out = extract_text("");
        assert!(out.is_empty());
        assert_eq!(out.word_count, 0);
    }

    #[test]
    fn malformed_html_does_not_panic() {
        let out = extract_text("<div><<p>unclosed &&& <span");
        // Whatever comes out, the invariant holds.
        assert_eq!(out.word_count == 0, out.text.is_empty());
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("  a\t\tb \n c  "), "a b c");
        assert_eq!(normalize_whitespace("\n\t "), "");
    }
}
