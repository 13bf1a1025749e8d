//! Question-text normalization.
//!
//! Everything downstream (extraction, similarity, fingerprints) works on
//! this normal form: lowercase, comparator glyphs preserved, stopwords gone.

/// Words dropped during tokenization.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "on", "in", "will", "be", "by", "to", "for", "vs", "at", "and", "or",
    "with",
];

/// Lowercases, strips non-alphanumerics except `>`, `<`, `=`, and collapses
/// whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '>' | '<' | '=') {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized tokens with stopwords removed.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(ToString::to_string)
        .collect()
}

/// Returns true if a normalized token is a stopword.
#[must_use]
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Order-insensitive key for a question: sorted tokens joined by spaces.
#[must_use]
pub fn stable_key(text: &str) -> String {
    let mut tokens = tokenize(text);
    tokens.sort();
    tokens.join(" ")
}
