// src/analysis/mod.rs
//! Analysis orchestration: one bounded call to the text-generation provider,
//! tolerant parsing of its reply, and a deterministic local fallback.
//!
//! `Analyzer::analyze` never returns an error. Whatever the provider does —
//! absent, slow, failing, or rambling — the caller always gets a usable
//! [`AnalysisResult`] and the cycle keeps moving.

pub mod fallback;
pub mod parse;
pub mod provider;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ingest::types::NewsItem;
use crate::valuation::ValuationRecord;
use fallback::PolarityLexicon;
use provider::AnalysisProvider;

/// Generation call deadline. Replies slower than this fall back locally.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(12);

/// Description text beyond this length adds noise, not signal, to the prompt.
const PROMPT_DESCRIPTION_CAP: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

/// Where the result came from; rendered in the message footer and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisBasis {
    Model,
    Fallback,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub impact: String,
    pub signal: String,
    pub direction: Direction,
    /// 1..=10
    pub confidence: u8,
    pub recommendation: String,
    pub basis: AnalysisBasis,
}

pub struct Analyzer {
    provider: Option<Arc<dyn AnalysisProvider>>,
    timeout: Duration,
    lexicon: PolarityLexicon,
}

impl Analyzer {
    pub fn new(provider: Option<Arc<dyn AnalysisProvider>>, lexicon: PolarityLexicon) -> Self {
        Self {
            provider,
            timeout: GENERATION_TIMEOUT,
            lexicon,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Produce an analysis for one item. Infallible by contract: model path
    /// first, deterministic fallback on timeout/transport/parse failure, fixed
    /// "unavailable" result when no provider is configured.
    pub async fn analyze(
        &self,
        item: &NewsItem,
        valuations: &BTreeMap<String, ValuationRecord>,
    ) -> AnalysisResult {
        let provider = match &self.provider {
            Some(p) => p,
            None => return fallback::unavailable_analysis(),
        };

        let prompt = build_prompt(item, valuations);
        match tokio::time::timeout(self.timeout, provider.generate(&prompt)).await {
            Ok(Ok(reply)) => match parse::parse_reply(&reply) {
                Some(parsed) => {
                    debug!(provider = provider.name(), "model analysis accepted");
                    parsed.into_result()
                }
                None => {
                    warn!(provider = provider.name(), "model reply unparseable, using fallback");
                    fallback::fallback_analysis(&item.title, valuations, &self.lexicon)
                }
            },
            Ok(Err(e)) => {
                warn!(provider = provider.name(), error = %e, "generation call failed, using fallback");
                fallback::fallback_analysis(&item.title, valuations, &self.lexicon)
            }
            Err(_) => {
                warn!(provider = provider.name(), timeout_secs = self.timeout.as_secs(), "generation call timed out, using fallback");
                fallback::fallback_analysis(&item.title, valuations, &self.lexicon)
            }
        }
    }
}

/// Research-analyst prompt in Arabic, with an explicit labeled-line answer
/// format so the reply parser has something to anchor on.
fn build_prompt(item: &NewsItem, valuations: &BTreeMap<String, ValuationRecord>) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(
        "أنت محلل مالي في قسم بحوث الأسهم ببنك استثمار يغطي البورصة المصرية.\n\
         حلل الخبر التالي وقدم خلاصة موجزة للمستثمرين.\n\n",
    );
    prompt.push_str(&format!("الخبر: {}\n", item.title));
    if !item.description.is_empty() {
        let desc: String = item.description.chars().take(PROMPT_DESCRIPTION_CAP).collect();
        prompt.push_str(&format!("التفاصيل: {desc}\n"));
    }

    if !valuations.is_empty() {
        prompt.push_str("\nبيانات التقييم المتاحة:\n");
        for record in valuations.values() {
            prompt.push_str(&format!("- {}", format_valuation_line(record)));
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nأجب بهذا الشكل تماماً، سطر لكل بند:\n\
         التأثير: <جملة واحدة عن أثر الخبر على السهم>\n\
         الإشارة: <نسبة أو رقم يلخص الأثر المتوقع>\n\
         الاتجاه: <إيجابي أو سلبي أو محايد>\n\
         الثقة: <رقم من 1 إلى 10>\n\
         التوصية: <شراء أو احتفاظ أو بيع مع سعر مستهدف>\n",
    );
    prompt
}

/// One-line summary of a valuation record, shared by the prompt builder and
/// the message template.
pub fn format_valuation_line(record: &ValuationRecord) -> String {
    let mut parts: Vec<String> = vec![format!("{} ({})", record.canonical_name(), record.ticker)];
    if let Some(p) = record.current_price {
        parts.push(format!("السعر الحالي {p:.2}"));
    }
    if let Some(fv) = record.fair_value {
        parts.push(format!("القيمة العادلة {fv:.2}"));
    }
    if let Some(up) = record.upside_percent {
        parts.push(format!("العائد المحتمل {up:+.1}%"));
    }
    if let Some(label) = &record.valuation_label {
        parts.push(label.clone());
    }
    parts.join("، ")
}
