//! EGX News Research Bot — Binary Entrypoint
//! Polls the configured feeds and the pulse listing page, then publishes
//! research notes to the Telegram channel. Runs one cycle with `--once`,
//! otherwise loops with a fixed inter-cycle sleep.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use egx_news_bot::analysis::fallback::PolarityLexicon;
use egx_news_bot::analysis::provider::{AnalysisProvider, GeminiProvider};
use egx_news_bot::analysis::Analyzer;
use egx_news_bot::config::{AppConfig, MAX_FEED_ITEMS};
use egx_news_bot::entities::EntityResolver;
use egx_news_bot::history::NewsHistory;
use egx_news_bot::ingest::providers::{pulse::PulseProvider, rss::RssProvider};
use egx_news_bot::ingest::types::SourceProvider;
use egx_news_bot::notify::telegram::TelegramNotifier;
use egx_news_bot::pipeline::{run_cycle, PipelineCtx};
use egx_news_bot::relevance::RelevanceFilter;
use egx_news_bot::valuation::ValuationCache;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("egx_news_bot=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in CI and production environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Configuration problems abort here, before any network activity.
    let config = AppConfig::from_env()?;
    let run_once = std::env::args().any(|a| a == "--once");

    let notifier = TelegramNotifier::new(
        config.telegram_token.clone(),
        config.telegram_channel_id.clone(),
    );
    let provider: Option<Arc<dyn AnalysisProvider>> = config
        .gemini_api_key
        .clone()
        .map(|key| Arc::new(GeminiProvider::new(key, None)) as Arc<dyn AnalysisProvider>);
    if provider.is_none() {
        warn!("no generation credential configured, analysis degrades to heuristics");
    }
    let analyzer = Analyzer::new(
        provider,
        PolarityLexicon::new(&config.positive_keywords, &config.negative_keywords),
    );
    let relevance = RelevanceFilter::new(&config.keywords);

    let mut history = NewsHistory::load(&config.history_path, config.history_cap);
    info!(
        records = history.len(),
        feeds = config.feeds.len(),
        "starting with loaded history"
    );

    loop {
        // The valuation cache (and the aliases it contributes) refreshes each cycle.
        let valuations = ValuationCache::load(&config.valuation_cache_path);
        let mut resolver = EntityResolver::new(
            config
                .entity_aliases
                .iter()
                .map(|(a, t)| (a.as_str(), t.as_str())),
        );
        resolver.extend_from_valuations(&valuations);

        let providers = build_providers(&config);
        let ctx = PipelineCtx {
            config: &config,
            relevance: &relevance,
            resolver: &resolver,
            valuations: &valuations,
            analyzer: &analyzer,
            notifier: &notifier,
        };

        let stats = run_cycle(&ctx, &providers, &mut history).await;
        info!(delivered = stats.delivered, fetched = stats.fetched, "cycle complete");

        if run_once {
            break;
        }
        tokio::time::sleep(Duration::from_secs(config.cycle_interval_secs)).await;
    }

    Ok(())
}

fn build_providers(config: &AppConfig) -> Vec<Box<dyn SourceProvider>> {
    let mut providers: Vec<Box<dyn SourceProvider>> = Vec::with_capacity(config.feeds.len() + 1);
    for feed in &config.feeds {
        providers.push(Box::new(RssProvider::new(
            feed.name.clone(),
            feed.url.clone(),
            MAX_FEED_ITEMS,
        )));
    }
    providers.push(Box::new(PulseProvider::new(
        config.pulse_url.clone(),
        config.pulse_origin.clone(),
    )));
    providers
}
