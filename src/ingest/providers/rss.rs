// src/ingest/providers/rss.rs
//! Syndication-feed provider. One instance per configured feed URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::{NewsItem, SourceKind, SourceProvider};

/// Request identity + timeout for feed fetches.
pub const FEED_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; egx-news-bot/0.1; +github.com/egx-research/egx-news-bot)";
const FEED_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    description: Option<String>,
}

pub struct RssProvider {
    name: String,
    url: String,
    client: reqwest::Client,
    max_items: usize,
}

impl RssProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, max_items: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(FEED_USER_AGENT)
            .timeout(FEED_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            name: name.into(),
            url: url.into(),
            client,
            max_items,
        }
    }
}

/// Parse a feed document into items, newest-first as served. Entries missing
/// a title or link are dropped; `guid` falls back to the link.
pub fn parse_feed(xml: &str, source: &str, max_items: usize) -> Result<Vec<NewsItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).with_context(|| format!("parsing {source} rss xml"))?;

    let mut out = Vec::new();
    for it in rss.channel.item.into_iter().take(max_items) {
        let title = crate::ingest::normalize_text(it.title.as_deref().unwrap_or_default());
        let link = it.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let description =
            crate::ingest::normalize_text(it.description.as_deref().unwrap_or_default());
        let guid = it
            .guid
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .or_else(|| Some(link.clone()));

        out.push(NewsItem {
            kind: SourceKind::Feed,
            source: source.to_string(),
            title,
            description,
            link,
            guid,
        });
    }
    Ok(out)
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("{} http get()", self.name))?
            .text()
            .await
            .with_context(|| format!("{} http .text()", self.name))?;
        parse_feed(&body, &self.name, self.max_items)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// Feed bodies mix HTML entities into XML; map the common ones before the
// strict XML parse.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
