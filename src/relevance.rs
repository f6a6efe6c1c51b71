// src/relevance.rs
//! Keyword gate deciding whether an item belongs to the tracked market.
//!
//! Semantics are deliberately permissive: any configured keyword appearing as
//! a substring of the lower-cased title + description accepts the item. No
//! stemming, no tokenization. False positives are acceptable; the keyword set
//! stays large to keep false negatives down.

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
}

impl RelevanceFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// True when any keyword occurs in the concatenated title + description.
    pub fn is_relevant(&self, title: &str, description: &str) -> bool {
        self.first_match(title, description).is_some()
    }

    /// The matching keyword, for reject-reason logging.
    pub fn first_match(&self, title: &str, description: &str) -> Option<&str> {
        let haystack = format!("{title} {description}").to_lowercase();
        self.keywords
            .iter()
            .find(|k| haystack.contains(k.as_str()))
            .map(|k| k.as_str())
    }
}
