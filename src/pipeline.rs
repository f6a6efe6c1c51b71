// src/pipeline.rs
//! Per-cycle orchestration: sources -> relevance -> dedup -> entities ->
//! valuation -> analysis -> message -> delivery -> history.
//!
//! Items are processed strictly in order, one at a time. A history record is
//! added only after Telegram confirmed the send, so an interrupted cycle can
//! only ever re-notify, never lose, an item.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::analysis::Analyzer;
use crate::config::{AppConfig, MAX_PULSE_DELIVERIES};
use crate::dedup::{self, Classification, DuplicateReason};
use crate::digest;
use crate::entities::EntityResolver;
use crate::history::{HistoryRecord, NewsHistory};
use crate::ingest::types::{NewsItem, SourceKind, SourceProvider};
use crate::message;
use crate::notify::Notifier;
use crate::relevance::RelevanceFilter;
use crate::valuation::ValuationCache;

/// Why an item was dropped. These are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotRelated,
    DuplicateHash,
    DuplicateSimilar,
    NoEntities,
    NoValuation,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotRelated => "not-related",
            RejectReason::DuplicateHash => "duplicate-hash",
            RejectReason::DuplicateSimilar => "duplicate-similar",
            RejectReason::NoEntities => "no-entities",
            RejectReason::NoValuation => "no-valuation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    Rejected(RejectReason),
    DeliveryFailed,
    /// Listing-page delivery cap already reached this cycle.
    ListingCapReached,
}

/// Everything a cycle needs, borrowed. Built once per cycle in `main` (the
/// valuation cache and resolver are refreshed each cycle), or assembled with
/// test doubles in scenario tests.
pub struct PipelineCtx<'a> {
    pub config: &'a AppConfig,
    pub relevance: &'a RelevanceFilter,
    pub resolver: &'a EntityResolver,
    pub valuations: &'a ValuationCache,
    pub analyzer: &'a Analyzer,
    pub notifier: &'a dyn Notifier,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub rejected_not_related: usize,
    pub rejected_duplicate_exact: usize,
    pub rejected_duplicate_similar: usize,
    pub rejected_no_entities: usize,
    pub rejected_no_valuation: usize,
    pub listing_capped: usize,
    /// Items that reached the entity-resolution stage.
    pub resolver_invocations: usize,
    /// Items that reached the analysis stage.
    pub analysis_invocations: usize,
}

impl CycleStats {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Delivered => self.delivered += 1,
            ItemOutcome::DeliveryFailed => self.delivery_failures += 1,
            ItemOutcome::ListingCapReached => self.listing_capped += 1,
            ItemOutcome::Rejected(reason) => match reason {
                RejectReason::NotRelated => self.rejected_not_related += 1,
                RejectReason::DuplicateHash => self.rejected_duplicate_exact += 1,
                RejectReason::DuplicateSimilar => self.rejected_duplicate_similar += 1,
                RejectReason::NoEntities => self.rejected_no_entities += 1,
                RejectReason::NoValuation => self.rejected_no_valuation += 1,
            },
        }
    }
}

/// One full cycle: fetch, process, persist. Storage failures are logged and
/// absorbed; the next cycle retries from whatever state survived.
pub async fn run_cycle(
    ctx: &PipelineCtx<'_>,
    providers: &[Box<dyn SourceProvider>],
    history: &mut NewsHistory,
) -> CycleStats {
    let items = crate::ingest::collect_items(providers).await;
    let stats = process_items(ctx, items, history).await;

    if let Err(e) = history.save(&ctx.config.history_path) {
        warn!(error = %e, "history save failed, will retry next cycle");
    }
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    if let Err(e) = digest::write_hourly_digest(&ctx.config.digest_path, ctx.valuations, now) {
        warn!(error = %e, "digest write failed");
    }

    info!(
        fetched = stats.fetched,
        delivered = stats.delivered,
        failures = stats.delivery_failures,
        "cycle finished"
    );
    stats
}

/// Run the per-item decision ladder over an already-fetched batch.
pub async fn process_items(
    ctx: &PipelineCtx<'_>,
    items: Vec<NewsItem>,
    history: &mut NewsHistory,
) -> CycleStats {
    let mut stats = CycleStats {
        fetched: items.len(),
        ..CycleStats::default()
    };
    let mut listing_delivered = 0usize;

    for item in items {
        if item.kind == SourceKind::Listing && listing_delivered >= MAX_PULSE_DELIVERIES {
            debug!(source = %item.source, "listing delivery cap reached, skipping");
            stats.record(ItemOutcome::ListingCapReached);
            continue;
        }

        let outcome = process_one(ctx, &item, history, &mut stats).await;
        stats.record(outcome);

        if outcome == ItemOutcome::Delivered {
            if item.kind == SourceKind::Listing {
                listing_delivered += 1;
            }
            // Pacing between sends, to stay inside the channel's rate limits.
            if ctx.config.delivery_pause_secs > 0 {
                tokio::time::sleep(Duration::from_secs(ctx.config.delivery_pause_secs)).await;
            }
        }
    }
    stats
}

async fn process_one(
    ctx: &PipelineCtx<'_>,
    item: &NewsItem,
    history: &mut NewsHistory,
    stats: &mut CycleStats,
) -> ItemOutcome {
    // Relevance comes first: irrelevant items never reach hashing or
    // entity work.
    if !ctx.relevance.is_relevant(&item.title, &item.description) {
        debug!(source = %item.source, reason = RejectReason::NotRelated.as_str(), "item rejected");
        return ItemOutcome::Rejected(RejectReason::NotRelated);
    }

    match dedup::classify(
        &item.title,
        &item.link,
        history,
        ctx.config.similarity_threshold,
    ) {
        Classification::Duplicate(DuplicateReason::ExactIdentity) => {
            debug!(reason = RejectReason::DuplicateHash.as_str(), "item rejected");
            return ItemOutcome::Rejected(RejectReason::DuplicateHash);
        }
        Classification::Duplicate(DuplicateReason::SimilarTitle) => {
            debug!(reason = RejectReason::DuplicateSimilar.as_str(), "item rejected");
            return ItemOutcome::Rejected(RejectReason::DuplicateSimilar);
        }
        Classification::Novel => {}
    }

    stats.resolver_invocations += 1;
    let text = format!("{} {}", item.title, item.description);
    let tickers: BTreeSet<String> = ctx.resolver.resolve(&text);
    if tickers.is_empty() {
        debug!(reason = RejectReason::NoEntities.as_str(), "item rejected");
        return ItemOutcome::Rejected(RejectReason::NoEntities);
    }

    let valuations = ctx.valuations.lookup(&tickers);
    if valuations.is_empty() && ctx.config.require_valuation {
        debug!(reason = RejectReason::NoValuation.as_str(), "item rejected");
        return ItemOutcome::Rejected(RejectReason::NoValuation);
    }

    stats.analysis_invocations += 1;
    let analysis = ctx.analyzer.analyze(item, &valuations).await;
    let rendered = message::render_report(item, &analysis, &valuations);

    match ctx.notifier.send(&rendered).await {
        Ok(()) => {
            let identity = dedup::item_identity(&item.title, &item.link);
            history.insert(HistoryRecord {
                identity,
                title: item.title.clone(),
                link: item.link.clone(),
                tickers,
                processed_at: chrono::Utc::now().timestamp().max(0) as u64,
            });
            info!(source = %item.source, title = %item.title, "report delivered");
            ItemOutcome::Delivered
        }
        Err(e) => {
            // Left out of history so the next cycle can retry the send.
            warn!(error = %e, source = %item.source, "delivery failed");
            ItemOutcome::DeliveryFailed
        }
    }
}
