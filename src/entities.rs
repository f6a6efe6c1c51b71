// src/entities.rs
//! Company-name resolution: surface-form aliases to EGX ticker symbols.
//!
//! Matching is lower-cased substring containment, many aliases to one ticker.
//! The result is a `BTreeSet` so it cannot depend on alias iteration order.

use std::collections::BTreeSet;

use crate::valuation::ValuationCache;

/// Aliases shorter than this are too ambiguous to match as substrings.
const MIN_ALIAS_CHARS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    // (lower-cased alias, ticker)
    aliases: Vec<(String, String)>,
}

impl EntityResolver {
    pub fn new<I, A, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, T)>,
        A: AsRef<str>,
        T: AsRef<str>,
    {
        let mut out = Self::default();
        for (alias, ticker) in pairs {
            out.add_alias(alias.as_ref(), ticker.as_ref());
        }
        out
    }

    pub fn add_alias(&mut self, alias: &str, ticker: &str) {
        let alias = alias.trim().to_lowercase();
        let ticker = ticker.trim().to_uppercase();
        if alias.chars().count() < MIN_ALIAS_CHARS || ticker.is_empty() {
            return;
        }
        if self
            .aliases
            .iter()
            .any(|(a, t)| *a == alias && *t == ticker)
        {
            return;
        }
        self.aliases.push((alias, ticker));
    }

    /// Fold the valuation dataset's display names in as extra aliases. The
    /// first name per record is the canonical one, but all of them resolve.
    pub fn extend_from_valuations(&mut self, cache: &ValuationCache) {
        for record in cache.iter() {
            for name in &record.names {
                self.add_alias(name, &record.ticker);
            }
        }
    }

    /// Distinct tickers referenced by `text`. Two aliases of the same ticker
    /// collapse to one entry.
    pub fn resolve(&self, text: &str) -> BTreeSet<String> {
        let haystack = text.to_lowercase();
        let mut out = BTreeSet::new();
        for (alias, ticker) in &self.aliases {
            if haystack.contains(alias.as_str()) {
                out.insert(ticker.clone());
            }
        }
        out
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}
