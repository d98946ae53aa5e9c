use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use bid_reconciler::ReconcileConfig;
use finale_core::models::BidRecord;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::WETH;

pub fn market() -> Address {
    Address::repeat_byte(0xe5)
}

pub fn bidder_a() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn bidder_b() -> Address {
    Address::repeat_byte(0xbb)
}

/// A WETH bid as it appears in a snapshot, flagged active by the indexer.
pub fn snapshot_bid(
    id: &str,
    bidder: Address,
    token_id: u64,
    amount: u64,
    block_number: u64,
    log_index: u64,
) -> BidRecord {
    BidRecord {
        id: id.to_string(),
        transaction_hash: B256::repeat_byte(block_number as u8),
        log_index,
        token_id: U256::from(token_id),
        token_contract: Address::repeat_byte(0xab),
        amount: U256::from(amount),
        amount_formatted: amount.to_string(),
        currency: WETH,
        currency_symbol: "WETH".to_string(),
        currency_decimals: 18,
        bidder,
        recipient: bidder,
        token_owner: None,
        timestamp: Some(1_610_000_000 + block_number),
        block_number,
        is_active: true,
        is_withdrawn: false,
        is_accepted: false,
    }
}

pub fn with_currency(mut bid: BidRecord, currency: Address, symbol: &str) -> BidRecord {
    bid.currency = currency;
    bid.currency_symbol = symbol.to_string();
    bid
}

/// No pauses between batches, short per-call timeout.
pub fn test_config() -> ReconcileConfig {
    ReconcileConfig {
        market_address: market(),
        bid_checks: BatchThrottle::unthrottled(BatchThrottle::DEFAULT_BID_CHECK_BATCH_SIZE),
        metadata_lookups: BatchThrottle::unthrottled(BatchThrottle::DEFAULT_METADATA_BATCH_SIZE),
        call_timeout: Duration::from_millis(200),
    }
}
