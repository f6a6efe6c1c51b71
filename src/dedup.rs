// src/dedup.rs
//! Item identity and duplicate detection.
//!
//! Identity is a SHA-256 digest over the normalized (title, link) pair, so the
//! same story always hashes the same across runs and platforms. Novelty is
//! decided in two steps: an exact identity lookup, then a fuzzy title scan
//! against every historical title with `strsim::normalized_levenshtein`. The
//! fuzzy pass is O(history); the retention cap on the store keeps that bounded.
//!
//! Classification has no side effects. The pipeline decides whether to record
//! the item after delivery succeeds.

use sha2::{Digest, Sha256};
use strsim::normalized_levenshtein;

use crate::history::NewsHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    ExactIdentity,
    SimilarTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Novel,
    Duplicate(DuplicateReason),
}

impl Classification {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Classification::Duplicate(_))
    }
}

/// Stable dedup key for an item: hex SHA-256 of trimmed title and link.
pub fn item_identity(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(link.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Classify a candidate against the history. Exact identity wins; otherwise
/// any historical title within `threshold` similarity marks a duplicate.
pub fn classify(
    title: &str,
    link: &str,
    history: &NewsHistory,
    threshold: f64,
) -> Classification {
    let identity = item_identity(title, link);
    if history.contains(&identity) {
        return Classification::Duplicate(DuplicateReason::ExactIdentity);
    }

    let candidate = title.trim();
    if !candidate.is_empty() {
        for seen in history.titles() {
            if normalized_levenshtein(candidate, seen.trim()) >= threshold {
                return Classification::Duplicate(DuplicateReason::SimilarTitle);
            }
        }
    }
    Classification::Novel
}
