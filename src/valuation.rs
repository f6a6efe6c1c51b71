// src/valuation.rs
//! Read-only valuation dataset: ticker -> fair value / upside figures.
//!
//! The cache file is produced elsewhere; this system only loads it at cycle
//! start and joins resolved tickers against it. A missing or corrupt file
//! degrades every item to "no valuation data" and is never fatal.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    #[serde(default)]
    pub ticker: String,
    /// Display names; the first entry is the canonical one.
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub fair_value: Option<f64>,
    #[serde(default)]
    pub upside_percent: Option<f64>,
    #[serde(default)]
    pub valuation_label: Option<String>,
}

impl ValuationRecord {
    pub fn canonical_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.ticker)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValuationCache {
    records: HashMap<String, ValuationRecord>,
}

impl ValuationCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ValuationRecord>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for r in records {
            if !r.ticker.is_empty() {
                map.insert(r.ticker.to_uppercase(), r);
            }
        }
        Self { records: map }
    }

    /// Load the JSON cache (a map of ticker -> record). Absence or corruption
    /// yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Self::empty();
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "valuation cache unreadable");
                return Self::empty();
            }
        };
        match serde_json::from_str::<HashMap<String, ValuationRecord>>(&raw) {
            Ok(map) => {
                let mut records = HashMap::with_capacity(map.len());
                for (ticker, mut r) in map {
                    let key = ticker.to_uppercase();
                    // The map key is authoritative for the symbol.
                    r.ticker = key.clone();
                    records.insert(key, r);
                }
                Self { records }
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "valuation cache corrupt, ignoring");
                Self::empty()
            }
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&ValuationRecord> {
        self.records.get(&ticker.to_uppercase())
    }

    /// Join a resolved ticker set against the cache. Absent tickers are
    /// omitted. Returns a `BTreeMap` so downstream iteration is deterministic.
    pub fn lookup(&self, tickers: &BTreeSet<String>) -> BTreeMap<String, ValuationRecord> {
        let mut out = BTreeMap::new();
        for t in tickers {
            if let Some(r) = self.get(t) {
                out.insert(r.ticker.clone(), r.clone());
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValuationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
