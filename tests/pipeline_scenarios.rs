// tests/pipeline_scenarios.rs
//! Cycle-level scenarios: novel item, exact and fuzzy re-submission, forced
//! generation timeout, irrelevant short-circuit, delivery failure, and the
//! listing-page delivery cap.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use egx_news_bot::analysis::fallback::PolarityLexicon;
use egx_news_bot::analysis::provider::{AnalysisProvider, MockProvider};
use egx_news_bot::analysis::Analyzer;
use egx_news_bot::config::AppConfig;
use egx_news_bot::entities::EntityResolver;
use egx_news_bot::history::NewsHistory;
use egx_news_bot::ingest::types::{NewsItem, SourceKind, SourceProvider};
use egx_news_bot::notify::Notifier;
use egx_news_bot::pipeline::{process_items, run_cycle, PipelineCtx};
use egx_news_bot::relevance::RelevanceFilter;
use egx_news_bot::valuation::{ValuationCache, ValuationRecord};

const WELL_FORMED_REPLY: &str = "\
التأثير: الخبر يعزز توقعات نمو أرباح البنك خلال العام الحالي بشكل ملموس.
الإشارة: +12% على صافي الربح
الاتجاه: إيجابي
الثقة: 8
التوصية: شراء بسعر مستهدف 95 جنيهاً";

struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _text: &str) -> Result<()> {
        Err(anyhow!("chat not found"))
    }
}

struct SlowProvider;

#[async_trait]
impl AnalysisProvider for SlowProvider {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(WELL_FORMED_REPLY.to_string())
    }
    fn name(&self) -> &'static str {
        "slow"
    }
}

fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        telegram_token: "test-token".into(),
        telegram_channel_id: "@test".into(),
        gemini_api_key: None,
        feeds: Vec::new(),
        pulse_url: String::new(),
        pulse_origin: "https://www.mubasher.info".into(),
        keywords: ["سهم", "بورصة", "أرباح", "كوبون", "نتائج أعمال", "مبيعات"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        positive_keywords: vec!["أرباح".into(), "زيادة".into()],
        negative_keywords: vec!["خسائر".into(), "تراجع".into()],
        entity_aliases: vec![
            ("البنك التجاري الدولي".into(), "COMI".into()),
            ("طلعت مصطفى".into(), "TMGH".into()),
            ("جهينة".into(), "JUFO".into()),
            ("الشرقية للدخان".into(), "EAST".into()),
            ("السويدي اليكتريك".into(), "SWDY".into()),
        ],
        similarity_threshold: 0.75,
        history_path: dir.join("sent_news.json"),
        history_cap: 500,
        valuation_cache_path: dir.join("valuation_cache.json"),
        digest_path: dir.join("valuation_digest.json"),
        require_valuation: false,
        cycle_interval_secs: 0,
        delivery_pause_secs: 0,
    }
}

fn valuations() -> ValuationCache {
    ValuationCache::from_records(vec![ValuationRecord {
        ticker: "COMI".into(),
        names: vec!["البنك التجاري الدولي".into()],
        current_price: Some(80.0),
        fair_value: Some(100.0),
        upside_percent: Some(25.0),
        valuation_label: Some("مقيم بأقل من قيمته".into()),
    }])
}

fn feed_item(title: &str, link: &str) -> NewsItem {
    NewsItem {
        kind: SourceKind::Feed,
        source: "ArabFinance/2".into(),
        title: title.into(),
        description: "تفاصيل نتائج أعمال الشركة.".into(),
        link: link.into(),
        guid: None,
    }
}

fn listing_item(title: &str, link: &str) -> NewsItem {
    NewsItem {
        kind: SourceKind::Listing,
        source: "MubasherPulse".into(),
        title: title.into(),
        description: "خبر عاجل من نبض الأسهم.".into(),
        link: link.into(),
        guid: None,
    }
}

struct Fixture {
    config: AppConfig,
    relevance: RelevanceFilter,
    resolver: EntityResolver,
    valuations: ValuationCache,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let relevance = RelevanceFilter::new(&config.keywords);
        let mut resolver = EntityResolver::new(
            config
                .entity_aliases
                .iter()
                .map(|(a, t)| (a.as_str(), t.as_str())),
        );
        let valuations = valuations();
        resolver.extend_from_valuations(&valuations);
        Self {
            config,
            relevance,
            resolver,
            valuations,
            _dir: dir,
        }
    }

    fn ctx<'a>(&'a self, analyzer: &'a Analyzer, notifier: &'a dyn Notifier) -> PipelineCtx<'a> {
        PipelineCtx {
            config: &self.config,
            relevance: &self.relevance,
            resolver: &self.resolver,
            valuations: &self.valuations,
            analyzer,
            notifier,
        }
    }

    fn lexicon(&self) -> PolarityLexicon {
        PolarityLexicon::new(&self.config.positive_keywords, &self.config.negative_keywords)
    }
}

const NOVEL_TITLE: &str = "البنك التجاري الدولي يحقق زيادة أرباح 20% خلال النصف الأول";
const NOVEL_LINK: &str = "https://www.arabfinance.com/ar/news/details/5001";

#[tokio::test]
async fn novel_relevant_item_produces_one_report_and_one_record() {
    let fx = Fixture::new();
    let provider = Arc::new(MockProvider::new(WELL_FORMED_REPLY));
    let analyzer = Analyzer::new(Some(provider.clone()), fx.lexicon());
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let stats = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;

    assert_eq!(stats.delivered, 1);
    assert_eq!(history.len(), 1);
    assert_eq!(provider.calls(), 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("تقرير بحوث البورصة المصرية"));
    assert!(sent[0].contains("COMI"));
    assert!(sent[0].contains("شراء بسعر مستهدف 95"));

    let record = &history.records()[0];
    assert!(record.tickers.contains("COMI"));
    assert_eq!(record.link, NOVEL_LINK);
}

#[tokio::test]
async fn resubmitted_item_is_rejected_as_exact_duplicate() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let first = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;
    assert_eq!(first.delivered, 1);

    // next cycle sees the same entry again
    let second = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;

    assert_eq!(second.delivered, 0);
    assert_eq!(second.rejected_duplicate_exact, 1);
    assert_eq!(history.len(), 1);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn near_identical_title_from_another_outlet_is_rejected_as_similar() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;

    let rewrite = "البنك التجاري الدولي يحقق زيادة أرباح 22% خلال النصف الأول";
    let stats = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(rewrite, "https://www.mubasher.info/news/eg/7100009")],
        &mut history,
    )
    .await;

    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.rejected_duplicate_similar, 1);
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn generation_timeout_still_delivers_via_fallback() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(Some(Arc::new(SlowProvider)), fx.lexicon())
        .with_timeout(Duration::from_millis(20));
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let stats = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;

    assert_eq!(stats.delivered, 1);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    // fallback footer, not the model one
    assert!(sent[0].contains("تعذر إجراء البحث المتعمق"));
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn irrelevant_item_short_circuits_before_resolution_and_analysis() {
    let fx = Fixture::new();
    let provider = Arc::new(MockProvider::new(WELL_FORMED_REPLY));
    let analyzer = Analyzer::new(Some(provider.clone()), fx.lexicon());
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let weather = NewsItem {
        kind: SourceKind::Feed,
        source: "ArabFinance/2".into(),
        title: "توقعات بموجة حر جديدة على القاهرة الكبرى".into(),
        description: "حالة الطقس غداً في المحافظات.".into(),
        link: "https://www.arabfinance.com/ar/news/details/5003".into(),
        guid: None,
    };
    let stats = process_items(&fx.ctx(&analyzer, &notifier), vec![weather], &mut history).await;

    assert_eq!(stats.rejected_not_related, 1);
    assert_eq!(stats.resolver_invocations, 0);
    assert_eq!(stats.analysis_invocations, 0);
    assert_eq!(provider.calls(), 0);
    assert!(notifier.sent().is_empty());
    assert!(history.is_empty());
}

#[tokio::test]
async fn relevant_item_without_entities_is_rejected_after_resolution() {
    let fx = Fixture::new();
    let provider = Arc::new(MockProvider::new(WELL_FORMED_REPLY));
    let analyzer = Analyzer::new(Some(provider.clone()), fx.lexicon());
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let stats = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(
            "جلسة تداول هادئة للمؤشر الرئيسي للبورصة",
            "https://www.arabfinance.com/ar/news/details/5005",
        )],
        &mut history,
    )
    .await;

    assert_eq!(stats.rejected_no_entities, 1);
    assert_eq!(stats.resolver_invocations, 1);
    assert_eq!(provider.calls(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn missing_valuation_skips_only_under_the_strict_policy() {
    let mut fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );

    // JUFO is resolvable but absent from the valuation cache.
    let item = feed_item(
        "جهينة تعلن نتائج أعمال الربع الأخير وتوزيع أرباح",
        "https://www.arabfinance.com/ar/news/details/6001",
    );

    // default policy: degraded delivery
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);
    let stats = process_items(&fx.ctx(&analyzer, &notifier), vec![item.clone()], &mut history).await;
    assert_eq!(stats.delivered, 1);
    assert!(notifier.sent()[0].contains("لا تتوفر بيانات تقييم"));

    // strict policy: rejected with a reason
    fx.config.require_valuation = true;
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);
    let stats = process_items(&fx.ctx(&analyzer, &notifier), vec![item], &mut history).await;
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.rejected_no_valuation, 1);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn failed_delivery_leaves_history_untouched_for_retry() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );
    let mut history = NewsHistory::new(fx.config.history_cap);

    let stats = process_items(
        &fx.ctx(&analyzer, &FailingNotifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;

    assert_eq!(stats.delivery_failures, 1);
    assert_eq!(stats.delivered, 0);
    assert!(history.is_empty());

    // the retry on the next cycle goes through
    let notifier = RecordingNotifier::new();
    let stats = process_items(
        &fx.ctx(&analyzer, &notifier),
        vec![feed_item(NOVEL_TITLE, NOVEL_LINK)],
        &mut history,
    )
    .await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn listing_deliveries_are_capped_per_cycle() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let items = vec![
        listing_item(
            "طلعت مصطفى تعلن مبيعات قياسية لمشروعاتها الجديدة",
            "https://www.mubasher.info/news/eg/1",
        ),
        listing_item(
            "الشرقية للدخان تقر توزيع كوبون نقدي عن العام المالي",
            "https://www.mubasher.info/news/eg/2",
        ),
        listing_item(
            "جهينة تكشف عن نتائج أعمال قوية وارتفاع أرباح التشغيل",
            "https://www.mubasher.info/news/eg/3",
        ),
        listing_item(
            "السويدي اليكتريك توقع عقد مشروعات كهرباء جديدة وأرباح متوقعة",
            "https://www.mubasher.info/news/eg/4",
        ),
    ];

    let stats = process_items(&fx.ctx(&analyzer, &notifier), items, &mut history).await;
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.listing_capped, 1);
    assert_eq!(notifier.sent().len(), 3);
}

struct StubSource(Vec<NewsItem>);

#[async_trait]
impl SourceProvider for StubSource {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &str {
        "Stub"
    }
}

#[tokio::test]
async fn run_cycle_persists_history_and_digest() {
    let fx = Fixture::new();
    let analyzer = Analyzer::new(
        Some(Arc::new(MockProvider::new(WELL_FORMED_REPLY))),
        fx.lexicon(),
    );
    let notifier = RecordingNotifier::new();
    let mut history = NewsHistory::new(fx.config.history_cap);

    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(StubSource(vec![feed_item(
        NOVEL_TITLE,
        NOVEL_LINK,
    )]))];

    let stats = run_cycle(&fx.ctx(&analyzer, &notifier), &providers, &mut history).await;
    assert_eq!(stats.delivered, 1);

    // both documents landed on disk
    let reloaded = NewsHistory::load(&fx.config.history_path, fx.config.history_cap);
    assert_eq!(reloaded.len(), 1);
    assert!(fx.config.digest_path.exists());
}
