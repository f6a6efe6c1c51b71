// src/analysis/parse.rs
//! Tolerant decoder from a free-text model reply to structured fields.
//!
//! The prompt asks for labeled lines (التأثير/الإشارة/الاتجاه/الثقة/التوصية)
//! but models decorate, reorder, and pad. This parser scans line by line,
//! strips markdown noise, and matches label prefixes; it is not a grammar.
//! `None` means the reply is unusable and the caller should fall back.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{AnalysisBasis, AnalysisResult, Direction};

/// An impact sentence shorter than this is a non-answer.
pub const MIN_IMPACT_CHARS: usize = 20;

/// Confidence used when the model omitted or mangled the number.
const DEFAULT_MODEL_CONFIDENCE: u8 = 6;

const IMPACT_LABELS: &[&str] = &["التأثير", "impact"];
const SIGNAL_LABELS: &[&str] = &["الإشارة", "الاشارة", "signal"];
const DIRECTION_LABELS: &[&str] = &["الاتجاه", "direction"];
const CONFIDENCE_LABELS: &[&str] = &["الثقة", "confidence"];
const RECOMMENDATION_LABELS: &[&str] = &["التوصية", "recommendation"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnalysis {
    pub impact: String,
    pub signal: Option<String>,
    pub direction: Direction,
    pub confidence: Option<u8>,
    pub recommendation: String,
}

impl ParsedAnalysis {
    pub fn into_result(self) -> AnalysisResult {
        AnalysisResult {
            impact: self.impact,
            signal: self.signal.unwrap_or_else(|| "غير محدد".to_string()),
            direction: self.direction,
            confidence: self.confidence.unwrap_or(DEFAULT_MODEL_CONFIDENCE),
            recommendation: self.recommendation,
            basis: AnalysisBasis::Model,
        }
    }
}

/// Extract the expected fields from a reply. Returns `None` when the impact
/// or the recommendation is missing, or the impact is implausibly short.
pub fn parse_reply(text: &str) -> Option<ParsedAnalysis> {
    let mut impact: Option<String> = None;
    let mut signal: Option<String> = None;
    let mut direction: Option<Direction> = None;
    let mut confidence: Option<u8> = None;
    let mut recommendation: Option<String> = None;

    for raw in text.lines() {
        let line = strip_decorations(raw);
        if line.is_empty() {
            continue;
        }
        // First occurrence of each label wins.
        if impact.is_none() {
            if let Some(v) = label_value(&line, IMPACT_LABELS) {
                impact = non_empty(v);
                continue;
            }
        }
        if signal.is_none() {
            if let Some(v) = label_value(&line, SIGNAL_LABELS) {
                signal = non_empty(v);
                continue;
            }
        }
        if direction.is_none() {
            if let Some(v) = label_value(&line, DIRECTION_LABELS) {
                direction = Some(parse_direction(&v));
                continue;
            }
        }
        if confidence.is_none() {
            if let Some(v) = label_value(&line, CONFIDENCE_LABELS) {
                confidence = parse_confidence(&v);
                continue;
            }
        }
        if recommendation.is_none() {
            if let Some(v) = label_value(&line, RECOMMENDATION_LABELS) {
                recommendation = non_empty(v);
            }
        }
    }

    let impact = impact?;
    if impact.chars().count() < MIN_IMPACT_CHARS {
        return None;
    }
    let recommendation = recommendation?;

    Some(ParsedAnalysis {
        impact,
        signal,
        direction: direction.unwrap_or(Direction::Unknown),
        confidence,
        recommendation,
    })
}

/// Drop markdown bold, list bullets, and heading markers; collapse edges.
fn strip_decorations(line: &str) -> String {
    let mut s = line.replace("**", "");
    s = s
        .trim_start_matches(['-', '*', '•', '#', ' ', '\t'])
        .trim()
        .to_string();
    s
}

/// If `line` starts with any of `labels` (ASCII case-insensitive) followed by
/// a separator, return the text after the separator.
fn label_value(line: &str, labels: &[&str]) -> Option<String> {
    let lowered = line.to_lowercase();
    for label in labels {
        let label_lower = label.to_lowercase();
        if !lowered.starts_with(&label_lower) {
            continue;
        }
        let rest = &line[label.len()..];
        let rest = rest.trim_start();
        let rest = rest
            .strip_prefix(&[':', '：', '-'][..])
            .unwrap_or(rest)
            .trim();
        return Some(rest.to_string());
    }
    None
}

fn non_empty(v: String) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

fn parse_direction(value: &str) -> Direction {
    let v = value.to_lowercase();
    if v.contains("إيجابي") || v.contains("ايجابي") || v.contains("صاعد") || v.contains("positive")
    {
        Direction::Positive
    } else if v.contains("سلبي") || v.contains("هابط") || v.contains("negative") {
        Direction::Negative
    } else if v.contains("محايد") || v.contains("neutral") {
        Direction::Neutral
    } else {
        Direction::Unknown
    }
}

fn parse_confidence(value: &str) -> Option<u8> {
    static RE_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex"));
    let m = RE_NUM.find(value)?;
    let n: u8 = m.as_str().parse().ok()?;
    (1..=10).contains(&n).then_some(n)
}
