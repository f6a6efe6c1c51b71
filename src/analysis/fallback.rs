// src/analysis/fallback.rs
//! Deterministic heuristic analysis used when the generation call is absent,
//! times out, errors, or returns an unparseable reply.
//!
//! Pure function of (title, valuation data, lexicon): the same inputs always
//! produce the same result, so the degraded path is fully testable offline.

use std::collections::BTreeMap;

use super::{AnalysisBasis, AnalysisResult, Direction};
use crate::valuation::ValuationRecord;

/// Upside above this lands in the buy band.
const BUY_UPSIDE_PERCENT: f64 = 15.0;
/// Upside below this lands in the sell band.
const SELL_UPSIDE_PERCENT: f64 = -10.0;
/// Targets in the buy band sit slightly under fair value.
const TARGET_DISCOUNT: f64 = 0.95;

const CONFIDENCE_WITH_VALUATION: u8 = 4;
const CONFIDENCE_WITHOUT_VALUATION: u8 = 3;
const CONFIDENCE_UNAVAILABLE: u8 = 2;

/// Positive/negative cue words checked against the title.
#[derive(Debug, Clone, Default)]
pub struct PolarityLexicon {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl PolarityLexicon {
    pub fn new<I, J, S>(positive: I, negative: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fn clean<S: AsRef<str>>(it: impl IntoIterator<Item = S>) -> Vec<String> {
            it.into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            positive: clean(positive),
            negative: clean(negative),
        }
    }

    fn polarity(&self, title: &str) -> Direction {
        let t = title.to_lowercase();
        let pos = self.positive.iter().filter(|k| t.contains(k.as_str())).count();
        let neg = self.negative.iter().filter(|k| t.contains(k.as_str())).count();
        if pos > neg {
            Direction::Positive
        } else if neg > pos {
            Direction::Negative
        } else {
            Direction::Neutral
        }
    }
}

/// Fixed result for the no-provider state.
pub fn unavailable_analysis() -> AnalysisResult {
    AnalysisResult {
        impact: "التحليل الآلي غير متاح حالياً، يُنصح بمتابعة إفصاحات الشركة.".to_string(),
        signal: "غير متاح".to_string(),
        direction: Direction::Unknown,
        confidence: CONFIDENCE_UNAVAILABLE,
        recommendation: "بانتظار مزيد من البيانات".to_string(),
        basis: AnalysisBasis::Unavailable,
    }
}

/// Heuristic substitute for a model answer. Direction comes from keyword
/// polarity over the title; the recommendation band from the first valuation
/// record (ticker order) carrying an upside figure.
pub fn fallback_analysis(
    title: &str,
    valuations: &BTreeMap<String, ValuationRecord>,
    lexicon: &PolarityLexicon,
) -> AnalysisResult {
    let direction = lexicon.polarity(title);
    let primary = valuations
        .values()
        .find(|r| r.upside_percent.is_some());

    let (signal, recommendation, confidence) = match primary {
        Some(record) => {
            let upside = record.upside_percent.unwrap_or(0.0);
            let signal = format!("{upside:+.1}% مقابل القيمة العادلة");
            let recommendation = recommendation_band(record, upside);
            (signal, recommendation, CONFIDENCE_WITH_VALUATION)
        }
        None => (
            "غير متاح".to_string(),
            "مراقبة لحين توفر بيانات تقييم".to_string(),
            CONFIDENCE_WITHOUT_VALUATION,
        ),
    };

    AnalysisResult {
        impact: impact_sentence(direction),
        signal,
        direction,
        confidence,
        recommendation,
        basis: AnalysisBasis::Fallback,
    }
}

fn impact_sentence(direction: Direction) -> String {
    let tone = match direction {
        Direction::Positive => "إيجابية",
        Direction::Negative => "سلبية",
        Direction::Neutral | Direction::Unknown => "محايدة",
    };
    format!("قراءة مبدئية: مؤشرات {tone} من صياغة الخبر، بانتظار تفاصيل مالية إضافية.")
}

fn recommendation_band(record: &ValuationRecord, upside: f64) -> String {
    if upside > BUY_UPSIDE_PERCENT {
        match record.fair_value {
            Some(fv) => format!("شراء بسعر مستهدف قرب {:.2}", fv * TARGET_DISCOUNT),
            None => "شراء مع متابعة مستويات التقييم".to_string(),
        }
    } else if upside < SELL_UPSIDE_PERCENT {
        "بيع، السعر الحالي أعلى من القيمة العادلة".to_string()
    } else {
        match (record.current_price, record.fair_value) {
            (Some(p), Some(fv)) => {
                format!("احتفاظ بسعر مستهدف قرب {:.2}", (p + fv) / 2.0)
            }
            _ => "احتفاظ لحين وضوح اتجاه السهم".to_string(),
        }
    }
}
