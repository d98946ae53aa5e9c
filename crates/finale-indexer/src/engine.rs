use alloy::{
    primitives::{utils::format_units, Address, U256},
    providers::{DynProvider, Provider},
    rpc::types::{BlockNumberOrTag, Filter, Log},
    sol_types::SolEvent,
};
use eyre::Result;
use finale_bindings::{
    AuctionApprovalUpdated, AuctionBid, AuctionCanceled, AuctionCreated, AuctionDurationExtended,
    AuctionEnded, AuctionReservePriceUpdated, Bid, BidCreated, BidFinalized, BidRemoved,
};
use finale_core::models::{AuctionRecord, BidRecord};
use finale_sdk::chain_reader::ChainReader;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::TokenMetadataCache;
use finale_sdk::DatabaseLocation;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_rusqlite::Connection;
use tracing::{info, info_span, warn, Instrument};

use crate::db::{
    get_auction, get_latest_processed_block, import_bids, lookup_address, mark_auction_settled,
    record_auction_bid, record_auction_canceled, record_auction_ended, record_bid_created,
    record_bid_finalized, record_bid_removed, set_auction_approval, set_auction_duration,
    set_auction_reserve_price, set_latest_processed_block, setup_database, upsert_auction,
};
use crate::models::AddressLookup;

pub const DEFAULT_LOG_CHUNK_SIZE: u64 = 2_000;
/// Bound on a single ERC-20 metadata read while recording a bid.
const METADATA_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Contracts whose logs are indexed. Market bids carry no token contract, so
/// bids are attributed to `media`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedContracts {
    pub market: Address,
    pub auction_house: Address,
    pub media: Address,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuctionSyncSummary {
    pub checked: usize,
    pub stored: usize,
    pub empty: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillSummary {
    pub from_block: u64,
    pub to_block: u64,
    pub logs_processed: usize,
}

#[derive(Clone)]
pub struct FinaleIndexer {
    pub database_connection: Arc<Connection>,
    token_cache: Arc<TokenMetadataCache>,
}

impl FinaleIndexer {
    pub async fn open(
        database_location: &DatabaseLocation,
        token_cache: Arc<TokenMetadataCache>,
    ) -> Result<Self> {
        let database_connection = Arc::new(match database_location.clone() {
            DatabaseLocation::InMemory => Connection::open_in_memory().await?,
            DatabaseLocation::Directory(path) => {
                Connection::open(get_qualified_database_path(path)?).await?
            }
        });
        setup_database(&database_connection).await?;

        Ok(Self {
            database_connection,
            token_cache,
        })
    }

    pub fn token_cache(&self) -> &Arc<TokenMetadataCache> {
        &self.token_cache
    }

    pub async fn lookup_address(&self, address: Address) -> Result<AddressLookup> {
        lookup_address(&self.database_connection, address).await
    }

    pub async fn import_snapshot(&self, bids: &[BidRecord]) -> Result<usize> {
        import_bids(&self.database_connection, bids).await
    }

    pub async fn mark_auction_settled(&self, auction_id: u64) -> Result<bool> {
        mark_auction_settled(&self.database_connection, auction_id).await
    }

    pub async fn get_auction(&self, auction_id: u64) -> Result<Option<AuctionRecord>> {
        get_auction(&self.database_connection, auction_id).await
    }

    pub async fn latest_processed_block(&self) -> Result<Option<u64>> {
        get_latest_processed_block(&self.database_connection).await
    }

    /// Reads `auctions(id)` for every id in `from_id..=to_id` and stores the ones that exist.
    /// A failed read is logged and skipped.
    pub async fn sync_auctions(
        &self,
        reader: &dyn ChainReader,
        from_id: u64,
        to_id: u64,
        throttle: &BatchThrottle,
    ) -> Result<AuctionSyncSummary> {
        let ids: Vec<u64> = (from_id..=to_id).collect();
        let mut summary = AuctionSyncSummary {
            checked: ids.len(),
            ..Default::default()
        };

        let reads = throttle
            .run(ids, |auction_id| async move {
                (auction_id, reader.auction(auction_id).await)
            })
            .await;

        for (auction_id, read) in reads {
            match read {
                Ok(auction) if auction.exists() => {
                    let mut record = auction.into_record(auction_id);
                    if let Some(existing) = get_auction(&self.database_connection, auction_id).await? {
                        record.is_settled = existing.is_settled;
                    }
                    upsert_auction(&self.database_connection, &record).await?;
                    summary.stored += 1;
                }
                Ok(_) => summary.empty += 1,
                Err(e) => {
                    warn!(auction_id, error = %e, "Failed to read auction");
                    summary.failed += 1;
                }
            }
        }

        info!(
            message = "Auction sync complete",
            operation = "sync_auctions",
            checked = summary.checked,
            stored = summary.stored,
            empty = summary.empty,
            failed = summary.failed
        );
        Ok(summary)
    }

    /// Walks `[start .. head]` in `chunk_size` windows, where `start` is the block after
    /// the last processed one (or `from_block` on a fresh store).
    pub async fn backfill(
        &self,
        provider: &DynProvider,
        reader: &dyn ChainReader,
        contracts: IndexedContracts,
        from_block: u64,
        chunk_size: u64,
    ) -> Result<BackfillSummary> {
        let chunk_size = chunk_size.max(1);
        let start = match self.latest_processed_block().await? {
            Some(latest) => {
                info!(
                    "Found latest processed block: {}. Resuming from block {}",
                    latest,
                    latest + 1
                );
                (latest + 1).max(from_block)
            }
            None => from_block,
        };

        let head = provider.get_block_number().await?;
        let mut from = start;
        let mut logs_processed = 0;
        let mut timestamps: HashMap<u64, u64> = HashMap::new();

        while from <= head {
            let to = head.min(from + chunk_size - 1);
            let mut logs = provider
                .get_logs(
                    &Filter::new()
                        .address(vec![contracts.market, contracts.auction_house])
                        .from_block(BlockNumberOrTag::Number(from))
                        .to_block(BlockNumberOrTag::Number(to)),
                )
                .await?;

            for log in logs.iter_mut() {
                fill_block_timestamp(provider, log, &mut timestamps).await?;
                self.process_log(log, reader, contracts).await?;
            }
            logs_processed += logs.len();
            set_latest_processed_block(&self.database_connection, to).await?;
            info!(from, to, logs = logs.len(), "Processed log chunk");
            from = to + 1;
        }

        Ok(BackfillSummary {
            from_block: start,
            to_block: head,
            logs_processed,
        })
    }

    pub async fn process_log(
        &self,
        log: &Log,
        reader: &dyn ChainReader,
        contracts: IndexedContracts,
    ) -> Result<()> {
        info!(
            "Processing log: block={:?}, tx={:?}",
            log.block_number, log.transaction_hash
        );

        let topic = log
            .topic0()
            .ok_or_else(|| eyre::eyre!("No topic found in log"))?;

        match *topic {
            BidCreated::SIGNATURE_HASH => {
                self.handle_bid_created(log, reader, contracts)
                    .instrument(info_span!("handle_bid_created"))
                    .await?;
            }
            BidRemoved::SIGNATURE_HASH => {
                self.handle_bid_removed(log)
                    .instrument(info_span!("handle_bid_removed"))
                    .await?;
            }
            BidFinalized::SIGNATURE_HASH => {
                self.handle_bid_finalized(log)
                    .instrument(info_span!("handle_bid_finalized"))
                    .await?;
            }
            AuctionCreated::SIGNATURE_HASH => {
                self.handle_auction_created(log)
                    .instrument(info_span!("handle_auction_created"))
                    .await?;
            }
            AuctionApprovalUpdated::SIGNATURE_HASH => {
                self.handle_auction_approval_updated(log)
                    .instrument(info_span!("handle_auction_approval_updated"))
                    .await?;
            }
            AuctionReservePriceUpdated::SIGNATURE_HASH => {
                self.handle_auction_reserve_price_updated(log)
                    .instrument(info_span!("handle_auction_reserve_price_updated"))
                    .await?;
            }
            AuctionBid::SIGNATURE_HASH => {
                self.handle_auction_bid(log)
                    .instrument(info_span!("handle_auction_bid"))
                    .await?;
            }
            AuctionDurationExtended::SIGNATURE_HASH => {
                self.handle_auction_duration_extended(log)
                    .instrument(info_span!("handle_auction_duration_extended"))
                    .await?;
            }
            AuctionEnded::SIGNATURE_HASH => {
                self.handle_auction_ended(log)
                    .instrument(info_span!("handle_auction_ended"))
                    .await?;
            }
            AuctionCanceled::SIGNATURE_HASH => {
                self.handle_auction_canceled(log)
                    .instrument(info_span!("handle_auction_canceled"))
                    .await?;
            }
            _ => {
                warn!("Unknown event topic");
            }
        }

        Ok(())
    }

    async fn handle_bid_created(
        &self,
        log: &Log,
        reader: &dyn ChainReader,
        contracts: IndexedContracts,
    ) -> Result<()> {
        info!("Received BidCreated event");
        let decoded = BidCreated::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode BidCreated event: {:?}", e))?;
        let bid = self
            .bid_record(log, decoded.data.tokenId, &decoded.data.bid, reader, contracts)
            .await?;

        let replaced = record_bid_created(&self.database_connection, &bid)
            .await
            .map_err(|e| eyre::eyre!("record_bid_created failed: {:?}", e))?;
        info!(bid_id = %bid.id, replaced, "Stored new active bid");
        Ok(())
    }

    async fn handle_bid_removed(&self, log: &Log) -> Result<()> {
        info!("Received BidRemoved event");
        let decoded = BidRemoved::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode BidRemoved event: {:?}", e))?;
        let updated = record_bid_removed(
            &self.database_connection,
            decoded.data.tokenId,
            decoded.data.bid.bidder,
        )
        .await
        .map_err(|e| eyre::eyre!("record_bid_removed failed: {:?}", e))?;
        if updated == 0 {
            warn!(token_id = %decoded.data.tokenId, "BidRemoved without a stored active bid");
        }
        Ok(())
    }

    async fn handle_bid_finalized(&self, log: &Log) -> Result<()> {
        info!("Received BidFinalized event");
        let decoded = BidFinalized::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode BidFinalized event: {:?}", e))?;
        let updated = record_bid_finalized(
            &self.database_connection,
            decoded.data.tokenId,
            decoded.data.bid.bidder,
        )
        .await
        .map_err(|e| eyre::eyre!("record_bid_finalized failed: {:?}", e))?;
        if updated == 0 {
            warn!(token_id = %decoded.data.tokenId, "BidFinalized without a stored active bid");
        }
        Ok(())
    }

    async fn handle_auction_created(&self, log: &Log) -> Result<()> {
        info!("Received AuctionCreated event");
        let decoded = AuctionCreated::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionCreated event: {:?}", e))?;
        let event = decoded.data;

        let auction = AuctionRecord {
            auction_id: event.auctionId.saturating_to::<u64>(),
            token_id: event.tokenId,
            token_contract: event.tokenContract,
            amount: U256::ZERO,
            reserve_price: event.reservePrice,
            duration: event.duration.saturating_to::<u64>(),
            first_bid_time: 0,
            curator_fee_percentage: event.curatorFeePercentage,
            auction_currency: event.auctionCurrency,
            token_owner: event.tokenOwner,
            bidder: Address::ZERO,
            curator: event.curator,
            // Auctions without a curator start approved.
            approved: event.curator == Address::ZERO,
            is_settled: false,
        };

        upsert_auction(&self.database_connection, &auction)
            .await
            .map_err(|e| eyre::eyre!("upsert_auction failed: {:?}", e))?;
        Ok(())
    }

    async fn handle_auction_approval_updated(&self, log: &Log) -> Result<()> {
        info!("Received AuctionApprovalUpdated event");
        let decoded = AuctionApprovalUpdated::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionApprovalUpdated event: {:?}", e))?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let found = set_auction_approval(&self.database_connection, auction_id, decoded.data.approved)
            .await
            .map_err(|e| eyre::eyre!("set_auction_approval failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn handle_auction_reserve_price_updated(&self, log: &Log) -> Result<()> {
        info!("Received AuctionReservePriceUpdated event");
        let decoded = AuctionReservePriceUpdated::decode_log(&log.inner).map_err(|e| {
            eyre::eyre!("Failed to decode AuctionReservePriceUpdated event: {:?}", e)
        })?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let found = set_auction_reserve_price(
            &self.database_connection,
            auction_id,
            decoded.data.reservePrice,
        )
        .await
        .map_err(|e| eyre::eyre!("set_auction_reserve_price failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn handle_auction_bid(&self, log: &Log) -> Result<()> {
        info!("Received AuctionBid event");
        let decoded = AuctionBid::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionBid event: {:?}", e))?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let bid_time = log
            .block_timestamp
            .ok_or_else(|| eyre::eyre!("Missing block timestamp in AuctionBid event"))?;

        let found = record_auction_bid(
            &self.database_connection,
            auction_id,
            decoded.data.sender,
            decoded.data.value,
            bid_time,
        )
        .await
        .map_err(|e| eyre::eyre!("record_auction_bid failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn handle_auction_duration_extended(&self, log: &Log) -> Result<()> {
        info!("Received AuctionDurationExtended event");
        let decoded = AuctionDurationExtended::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionDurationExtended event: {:?}", e))?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let found = set_auction_duration(
            &self.database_connection,
            auction_id,
            decoded.data.duration.saturating_to::<u64>(),
        )
        .await
        .map_err(|e| eyre::eyre!("set_auction_duration failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn handle_auction_ended(&self, log: &Log) -> Result<()> {
        info!("Received AuctionEnded event");
        let decoded = AuctionEnded::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionEnded event: {:?}", e))?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let found = record_auction_ended(
            &self.database_connection,
            auction_id,
            decoded.data.winner,
            decoded.data.amount,
        )
        .await
        .map_err(|e| eyre::eyre!("record_auction_ended failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn handle_auction_canceled(&self, log: &Log) -> Result<()> {
        info!("Received AuctionCanceled event");
        let decoded = AuctionCanceled::decode_log(&log.inner)
            .map_err(|e| eyre::eyre!("Failed to decode AuctionCanceled event: {:?}", e))?;
        let auction_id = decoded.data.auctionId.saturating_to::<u64>();
        let found = record_auction_canceled(&self.database_connection, auction_id)
            .await
            .map_err(|e| eyre::eyre!("record_auction_canceled failed: {:?}", e))?;
        warn_if_missing(found, auction_id);
        Ok(())
    }

    async fn bid_record(
        &self,
        log: &Log,
        token_id: U256,
        bid: &Bid,
        reader: &dyn ChainReader,
        contracts: IndexedContracts,
    ) -> Result<BidRecord> {
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| eyre::eyre!("Missing txid in bid event"))?;
        let block_number = log
            .block_number
            .ok_or_else(|| eyre::eyre!("Missing block number in bid event"))?;
        let log_index = log
            .log_index
            .ok_or_else(|| eyre::eyre!("Missing log index in bid event"))?;

        let token = self
            .token_cache
            .resolve(bid.currency, reader, METADATA_CALL_TIMEOUT)
            .await;
        let decimals = token.metadata.decimals;
        let amount_formatted =
            format_units(bid.amount, decimals).unwrap_or_else(|_| bid.amount.to_string());

        Ok(BidRecord {
            id: format!("{transaction_hash}-{log_index}"),
            transaction_hash,
            log_index,
            token_id,
            token_contract: contracts.media,
            amount: bid.amount,
            amount_formatted,
            currency: bid.currency,
            currency_symbol: token.metadata.symbol,
            currency_decimals: decimals,
            bidder: bid.bidder,
            recipient: bid.recipient,
            token_owner: None,
            timestamp: log.block_timestamp,
            block_number,
            is_active: true,
            is_withdrawn: false,
            is_accepted: false,
        })
    }
}

fn warn_if_missing(found: bool, auction_id: u64) {
    if !found {
        warn!(auction_id, "Event for an auction that is not stored");
    }
}

/// Nodes may omit `blockTimestamp` on logs; fetch the header once per block when they do.
async fn fill_block_timestamp(
    provider: &DynProvider,
    log: &mut Log,
    timestamps: &mut HashMap<u64, u64>,
) -> Result<()> {
    if log.block_timestamp.is_some() {
        return Ok(());
    }
    let block_number = log
        .block_number
        .ok_or_else(|| eyre::eyre!("Missing block number in log"))?;
    let timestamp = match timestamps.get(&block_number) {
        Some(timestamp) => *timestamp,
        None => {
            let block = provider
                .get_block_by_number(BlockNumberOrTag::Number(block_number))
                .await?
                .ok_or_else(|| eyre::eyre!("Block {} not found", block_number))?;
            timestamps.insert(block_number, block.header.timestamp);
            block.header.timestamp
        }
    };
    log.block_timestamp = Some(timestamp);
    Ok(())
}

fn get_qualified_database_path(database_location: String) -> Result<String> {
    let path = PathBuf::from(database_location).join("finale.db");
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| eyre::eyre!("Invalid database path"))
}
