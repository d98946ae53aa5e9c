//! Reconciles a stale snapshot of Market bids against the live contract.
//!
//! A run goes through three stages, each producing a new annotated copy of the
//! input rather than mutating it:
//!
//! 1. [`verify`]: read the bid the contract currently holds for every
//!    (tokenId, bidder) pair; a row is active only on an exact, non-zero match.
//! 2. [`dedup`]: among active rows, keep the latest per (bidder, tokenId).
//! 3. [`normalize`]: replace placeholder currency symbols through the static
//!    token table and the injected [`TokenMetadataCache`].
//!
//! RPC failures never abort a run; they are counted in the report.

pub mod dedup;
pub mod normalize;
pub mod report;
pub mod verify;

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use finale_core::models::BidRecord;
use finale_sdk::chain_reader::ChainReader;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::TokenMetadataCache;
use tracing::{info, info_span, Instrument};

use crate::dedup::deduplicate;
use crate::normalize::normalize_currency_symbols;
use crate::report::{
    currency_breakdown, summarize, weth_summary, ReportMetadata, VerificationReport,
    VERIFICATION_METHOD,
};
use crate::verify::{verify_bids, VerificationResult};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Market contract the bids are checked against, recorded in the report.
    pub market_address: Address,
    pub bid_checks: BatchThrottle,
    pub metadata_lookups: BatchThrottle,
    /// Upper bound for a single bid or token metadata read. An expired bid read
    /// counts as an error, an expired metadata read falls back to `UNKNOWN`.
    pub call_timeout: Duration,
}

impl ReconcileConfig {
    pub fn new(market_address: Address) -> Self {
        Self {
            market_address,
            bid_checks: BatchThrottle::bid_checks(),
            metadata_lookups: BatchThrottle::token_metadata(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    /// Verified, deduplicated and symbol-normalized active bids.
    pub active_bids: Vec<BidRecord>,
    pub results: Vec<VerificationResult>,
    pub removed_duplicates: Vec<BidRecord>,
    pub report: VerificationReport,
    pub started_at: DateTime<Utc>,
}

pub struct BidReconciler {
    reader: Arc<dyn ChainReader>,
    token_cache: Arc<TokenMetadataCache>,
    config: ReconcileConfig,
}

impl BidReconciler {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        token_cache: Arc<TokenMetadataCache>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            reader,
            token_cache,
            config,
        }
    }

    pub fn token_cache(&self) -> &Arc<TokenMetadataCache> {
        &self.token_cache
    }

    pub async fn reconcile(&self, bids: &[BidRecord], source_file: &str) -> ReconciliationOutcome {
        let span = info_span!("reconcile_bids", source_file, bids = bids.len());
        self.reconcile_inner(bids, source_file).instrument(span).await
    }

    async fn reconcile_inner(&self, bids: &[BidRecord], source_file: &str) -> ReconciliationOutcome {
        let started_at = Utc::now();
        let timer = Instant::now();
        let reader = self.reader.as_ref();

        info!(
            bids = bids.len(),
            batch_size = self.config.bid_checks.batch_size(),
            "Verifying bids against market contract"
        );
        let results = verify_bids(
            reader,
            bids,
            &self.config.bid_checks,
            self.config.call_timeout,
        )
        .await;

        let verified_active: Vec<BidRecord> = results
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.bid.clone())
            .collect();
        let dedup = deduplicate(verified_active);

        let normalized = normalize_currency_symbols(
            dedup.kept.clone(),
            &self.token_cache,
            reader,
            &self.config.metadata_lookups,
            self.config.call_timeout,
        )
        .await;

        let summary = summarize(
            &results,
            dedup.duplicates_found,
            dedup.duplicates_removed(),
            normalized.bids.len(),
            normalized.symbols_updated,
        );

        let mut reported_symbols = Vec::with_capacity(bids.len());
        for bid in bids {
            reported_symbols.push((self.reported_symbol(bid).await, bid));
        }
        let breakdown = currency_breakdown(reported_symbols, &normalized.bids);
        let weth = weth_summary(bids, &normalized.bids);

        let report = VerificationReport {
            metadata: ReportMetadata {
                created_at: started_at.to_rfc3339(),
                source_file: source_file.to_string(),
                verification_method: VERIFICATION_METHOD.to_string(),
                contract_address: self.config.market_address,
                total_bids_checked: results.len(),
                processing_time: format!("{:.2}s", timer.elapsed().as_secs_f64()),
            },
            summary,
            currency_breakdown: breakdown,
            weth_summary: weth,
        };

        info!(
            message = "Bid reconciliation complete",
            total = report.summary.total_bids,
            active = report.summary.active_bids,
            inactive = report.summary.inactive_bids,
            errors = report.summary.error_bids,
            duplicates_removed = report.summary.duplicates_removed,
            final_active = report.summary.final_active_bids,
            processing_time = %report.metadata.processing_time
        );

        ReconciliationOutcome {
            active_bids: normalized.bids,
            results,
            removed_duplicates: dedup.removed,
            report,
            started_at,
        }
    }

    /// Placeholder symbols are reported under whatever is already known for the
    /// currency; this never triggers a network call.
    async fn reported_symbol(&self, bid: &BidRecord) -> String {
        if bid.has_placeholder_symbol() {
            if let Some(resolved) = self.token_cache.peek(&bid.currency).await {
                return resolved.metadata.symbol;
            }
        }
        bid.currency_symbol.clone()
    }
}
