// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{NewsItem, SourceProvider};

/// Normalize text: decode HTML entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” « » ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Fetch from every provider sequentially. A failing source is logged and
/// skipped; it never aborts the others.
pub async fn collect_items(providers: &[Box<dyn SourceProvider>]) -> Vec<NewsItem> {
    let mut out = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut items) => {
                tracing::debug!(provider = p.name(), count = items.len(), "source fetched");
                out.append(&mut items);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error, skipping source");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;
    use anyhow::anyhow;

    #[test]
    fn normalize_decodes_strips_and_collapses() {
        let s = "  <b>أرباح&nbsp;&nbsp;الشركة</b> ترتفع ";
        assert_eq!(normalize_text(s), "أرباح الشركة ترتفع");
    }

    #[test]
    fn normalize_maps_curly_quotes() {
        assert_eq!(normalize_text("«الشركة» تعلن “نتائج”"), "\"الشركة\" تعلن \"نتائج\"");
    }

    struct Good;
    struct Bad;

    #[async_trait::async_trait]
    impl SourceProvider for Good {
        async fn fetch_latest(&self) -> anyhow::Result<Vec<NewsItem>> {
            Ok(vec![NewsItem {
                kind: SourceKind::Feed,
                source: "Good".into(),
                title: "عنوان".into(),
                description: String::new(),
                link: "https://x/1".into(),
                guid: None,
            }])
        }
        fn name(&self) -> &str {
            "Good"
        }
    }

    #[async_trait::async_trait]
    impl SourceProvider for Bad {
        async fn fetch_latest(&self) -> anyhow::Result<Vec<NewsItem>> {
            Err(anyhow!("connection refused"))
        }
        fn name(&self) -> &str {
            "Bad"
        }
    }

    #[tokio::test]
    async fn one_failing_source_does_not_abort_the_rest() {
        let providers: Vec<Box<dyn SourceProvider>> =
            vec![Box::new(Bad), Box::new(Good), Box::new(Bad)];
        let items = collect_items(&providers).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "Good");
    }
}
