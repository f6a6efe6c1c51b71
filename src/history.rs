// src/history.rs
//! Durable record of delivered items, backed by a single JSON file.
//!
//! A record is inserted only after its message was confirmed sent, so a crash
//! mid-cycle can at worst re-notify the items that were in flight. Load
//! tolerates a missing or corrupt file (empty store); save truncates to the
//! retention cap before writing and is best-effort for the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub identity: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub tickers: BTreeSet<String>,
    pub processed_at: u64,
}

/// In-memory view of the history file. Insertion order is retention order.
#[derive(Debug)]
pub struct NewsHistory {
    records: Vec<HistoryRecord>,
    index: HashSet<String>,
    cap: usize,
}

#[derive(Serialize, Deserialize)]
struct HistoryFile {
    records: Vec<HistoryRecord>,
}

impl NewsHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            index: HashSet::new(),
            cap: cap.max(1),
        }
    }

    /// Load from `path`. Absent or unreadable storage yields an empty store;
    /// this is a degraded start, not an error.
    pub fn load(path: &Path, cap: usize) -> Self {
        let mut out = Self::new(cap);
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return out,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "history unreadable, starting empty");
                return out;
            }
        };

        if let Ok(file) = serde_json::from_str::<HistoryFile>(&raw) {
            for r in file.records {
                out.insert(r);
            }
            return out;
        }
        // Legacy format: bare JSON array of identity strings.
        if let Ok(ids) = serde_json::from_str::<Vec<String>>(&raw) {
            for identity in ids {
                out.insert(HistoryRecord {
                    identity,
                    title: String::new(),
                    link: String::new(),
                    tickers: BTreeSet::new(),
                    processed_at: 0,
                });
            }
            return out;
        }
        warn!(path = %path.display(), "history file corrupt, starting empty");
        out
    }

    /// Persist to `path`, oldest records dropped beyond the cap. Writes via a
    /// temp file + rename so a crash never leaves a torn file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let start = self.records.len().saturating_sub(self.cap);
        let file = HistoryFile {
            records: self.records[start..].to_vec(),
        };
        let json = serde_json::to_string(&file).context("serializing history")?;

        let tmp = path.with_extension("json.tmp");
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    /// Insert one record, ignoring identities already present. The cap is
    /// enforced eagerly so the fuzzy-match scan stays bounded in long runs.
    pub fn insert(&mut self, record: HistoryRecord) {
        if !self.index.insert(record.identity.clone()) {
            return;
        }
        self.records.push(record);
        if self.records.len() > self.cap {
            let excess = self.records.len() - self.cap;
            for dropped in self.records.drain(0..excess) {
                self.index.remove(&dropped.identity);
            }
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains(identity)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|r| r.title.as_str())
            .filter(|t| !t.is_empty())
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
