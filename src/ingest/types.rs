// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Where an item came from; the pipeline treats listing-page items under a
/// stricter per-cycle delivery cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Feed,
    Listing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub kind: SourceKind,
    /// Provider display name, e.g. "Mubasher".
    pub source: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub guid: Option<String>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}
