// src/ingest/providers/pulse.rs
//! Listing-page provider: scrapes article anchors from the Mubasher pulse
//! stocks page. Structural matching only — an anchor qualifies when its href
//! carries the news-path marker and its text is long enough to be a headline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;

use super::rss::FEED_USER_AGENT;
use crate::ingest::types::{NewsItem, SourceKind, SourceProvider};

const PULSE_TIMEOUT: Duration = Duration::from_secs(20);

/// Href must contain this to count as an article link.
const NEWS_PATH_MARKER: &str = "/news/";
/// Anchor text at or below this length is navigation chrome, not a headline.
const MIN_TITLE_CHARS: usize = 20;

/// Listing pages carry no summaries; the message template needs some body.
const PULSE_DESCRIPTION: &str = "خبر عاجل من نبض الأسهم.";

static RE_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*"([^"]+)"[^>]*>(.*?)</a>"#).expect("anchor regex")
});

pub struct PulseProvider {
    url: String,
    origin: String,
    client: reqwest::Client,
}

impl PulseProvider {
    pub fn new(url: impl Into<String>, origin: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(FEED_USER_AGENT)
            .timeout(PULSE_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            url: url.into(),
            origin: origin.into(),
            client,
        }
    }
}

/// Pull qualifying article anchors out of a listing page. Relative hrefs are
/// absolutized against `origin`; repeated links are kept once.
pub fn extract_listing_items(html: &str, origin: &str) -> Vec<NewsItem> {
    let origin = origin.trim_end_matches('/');
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for caps in RE_ANCHOR.captures_iter(html) {
        let href = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if !href.contains(NEWS_PATH_MARKER) {
            continue;
        }
        let title = crate::ingest::normalize_text(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
        if title.chars().count() <= MIN_TITLE_CHARS {
            continue;
        }

        let link = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{origin}{href}")
        };
        if !seen_links.insert(link.clone()) {
            continue;
        }

        let guid = link
            .rsplit('/')
            .find(|seg| !seg.is_empty())
            .map(|s| s.to_string())
            .or_else(|| Some(link.clone()));

        out.push(NewsItem {
            kind: SourceKind::Listing,
            source: "MubasherPulse".to_string(),
            title,
            description: PULSE_DESCRIPTION.to_string(),
            link,
            guid,
        });
    }
    out
}

#[async_trait]
impl SourceProvider for PulseProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("pulse http get()")?
            .text()
            .await
            .context("pulse http .text()")?;
        Ok(extract_listing_items(&body, &self.origin))
    }

    fn name(&self) -> &str {
        "MubasherPulse"
    }
}
