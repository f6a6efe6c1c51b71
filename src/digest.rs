// src/digest.rs
//! Hourly valuation digest: a small JSON snapshot of the loaded valuation
//! dataset, ordered by upside. Overwritten in place, written at most once per
//! hour bucket. Best-effort output; failures never touch the cycle.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::valuation::ValuationCache;

/// Entries kept in one digest document.
const DIGEST_LIMIT: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct ValuationDigest {
    pub generated_at: u64,
    pub entries: Vec<DigestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub ticker: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub fair_value: Option<f64>,
    pub upside_percent: Option<f64>,
    pub valuation_label: Option<String>,
}

/// Write the digest unless one was already written in this hour bucket.
/// Returns whether a new document landed on disk.
pub fn write_hourly_digest(path: &Path, cache: &ValuationCache, now_unix: u64) -> Result<bool> {
    if cache.is_empty() {
        return Ok(false);
    }
    if let Some(prev) = read_generated_at(path) {
        if prev / 3600 == now_unix / 3600 {
            return Ok(false);
        }
    }

    let mut entries: Vec<DigestEntry> = cache
        .iter()
        .map(|r| DigestEntry {
            ticker: r.ticker.clone(),
            name: r.canonical_name().to_string(),
            current_price: r.current_price,
            fair_value: r.fair_value,
            upside_percent: r.upside_percent,
            valuation_label: r.valuation_label.clone(),
        })
        .collect();
    // Largest upside first; tickers without a figure sink to the tail.
    entries.sort_by(|a, b| {
        let ua = a.upside_percent.unwrap_or(f64::NEG_INFINITY);
        let ub = b.upside_percent.unwrap_or(f64::NEG_INFINITY);
        ub.partial_cmp(&ua)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    entries.truncate(DIGEST_LIMIT);

    let digest = ValuationDigest {
        generated_at: now_unix,
        entries,
    };
    let json = serde_json::to_string_pretty(&digest).context("serializing digest")?;

    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(json.as_bytes())
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(true)
}

fn read_generated_at(path: &Path) -> Option<u64> {
    let raw = fs::read_to_string(path).ok()?;
    let digest: ValuationDigest = serde_json::from_str(&raw).ok()?;
    Some(digest.generated_at)
}
