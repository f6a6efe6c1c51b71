// src/message.rs
//! Telegram message assembly: the Arabic research-report template.
//!
//! Interpolated text is HTML-escaped; only the template's own tags reach
//! Telegram as markup.

use std::collections::BTreeMap;

use crate::analysis::{AnalysisBasis, AnalysisResult, Direction};
use crate::ingest::types::NewsItem;
use crate::valuation::ValuationRecord;

/// Description text beyond this is elided from the message body.
const DESCRIPTION_PREVIEW_CHARS: usize = 300;

pub fn render_report(
    item: &NewsItem,
    analysis: &AnalysisResult,
    valuations: &BTreeMap<String, ValuationRecord>,
) -> String {
    let title = escape(&item.title);
    let link = escape_attr(&item.link);

    let mut msg = String::with_capacity(1024);
    msg.push_str("🏛 <b>تقرير بحوث البورصة المصرية</b>\n");
    msg.push_str("━━━━━━━━━━━━━━━\n");
    msg.push_str(&format!("📌 <b>العنوان:</b> {title}\n\n"));

    if !item.description.is_empty() {
        let preview = preview(&item.description);
        msg.push_str(&format!("📰 <b>ملخص الخبر:</b>\n{}\n\n", escape(&preview)));
    }

    if valuations.is_empty() {
        msg.push_str("💹 <i>لا تتوفر بيانات تقييم لهذا الخبر.</i>\n\n");
    } else {
        msg.push_str("💹 <b>بيانات التقييم:</b>\n");
        for record in valuations.values() {
            msg.push_str(&format!(
                "• {}\n",
                escape(&crate::analysis::format_valuation_line(record))
            ));
        }
        msg.push('\n');
    }

    msg.push_str("🔬 <b>التحليل:</b>\n");
    msg.push_str(&format!("{} {}\n", direction_emoji(analysis.direction), escape(&analysis.impact)));
    msg.push_str(&format!("📊 <b>الإشارة:</b> {}\n", escape(&analysis.signal)));
    msg.push_str(&format!("🎯 <b>التوصية:</b> {}\n", escape(&analysis.recommendation)));
    msg.push_str(&format!("⚖️ <b>درجة الثقة:</b> {}/10\n\n", analysis.confidence));

    msg.push_str(&format!("🔗 <a href=\"{link}\">المصدر الأصلي</a>\n"));
    msg.push_str("━━━━━━━━━━━━━━━\n");
    msg.push_str(basis_footer(analysis.basis));
    msg
}

fn preview(description: &str) -> String {
    let mut out: String = description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        out.push('…');
    }
    out
}

fn direction_emoji(direction: Direction) -> &'static str {
    match direction {
        Direction::Positive => "📈",
        Direction::Negative => "📉",
        Direction::Neutral => "➖",
        Direction::Unknown => "❔",
    }
}

fn basis_footer(basis: AnalysisBasis) -> &'static str {
    match basis {
        AnalysisBasis::Model => {
            "⚠️ <i>هذا التحليل أُعد بمساعدة ذكاء اصطناعي لأغراض استرشادية فقط.</i>"
        }
        AnalysisBasis::Fallback => {
            "⚠️ <i>تحليل مبدئي آلي، تعذر إجراء البحث المتعمق حالياً.</i>"
        }
        AnalysisBasis::Unavailable => {
            "⚠️ <i>التحليل الآلي غير مفعل، المعلومات للعرض فقط.</i>"
        }
    }
}

fn escape(s: &str) -> String {
    html_escape::encode_text(s).to_string()
}

fn escape_attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).to_string()
}
