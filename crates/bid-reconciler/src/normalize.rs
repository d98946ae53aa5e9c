use std::collections::BTreeSet;
use std::time::Duration;

use alloy::primitives::Address;
use finale_core::models::BidRecord;
use finale_sdk::chain_reader::ChainReader;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::TokenMetadataCache;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub bids: Vec<BidRecord>,
    pub symbols_updated: usize,
}

/// Replaces placeholder currency symbols with resolved ones. Only `currency_symbol`
/// changes; every other field of the record is carried over untouched. Tokens that
/// fail to resolve, or do not answer within `call_timeout`, get the fallback symbol
/// and are not counted as updated.
pub async fn normalize_currency_symbols(
    bids: Vec<BidRecord>,
    cache: &TokenMetadataCache,
    reader: &dyn ChainReader,
    throttle: &BatchThrottle,
    call_timeout: Duration,
) -> NormalizeOutcome {
    // one lookup per distinct currency, sorted so batches are reproducible
    let unresolved: BTreeSet<Address> = bids
        .iter()
        .filter(|bid| bid.has_placeholder_symbol())
        .map(|bid| bid.currency)
        .collect();

    if !unresolved.is_empty() {
        info!(
            currencies = unresolved.len(),
            "Resolving placeholder currency symbols"
        );
        throttle
            .run(unresolved.into_iter().collect(), |token| {
                cache.resolve(token, reader, call_timeout)
            })
            .await;
    }

    let mut symbols_updated = 0;
    let mut normalized = Vec::with_capacity(bids.len());
    for mut bid in bids {
        if bid.has_placeholder_symbol() {
            if let Some(resolved) = cache.peek(&bid.currency).await {
                if resolved.is_authoritative() {
                    symbols_updated += 1;
                }
                bid.currency_symbol = resolved.metadata.symbol;
            }
        }
        normalized.push(bid);
    }

    NormalizeOutcome {
        bids: normalized,
        symbols_updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{B256, U256};
    use async_trait::async_trait;
    use finale_sdk::chain_reader::{ChainReadError, OnchainAuction, OnchainBid, TokenMetadata};
    use finale_sdk::token_metadata::WETH;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rare() -> Address {
        Address::repeat_byte(0x77)
    }

    fn broken() -> Address {
        Address::repeat_byte(0x66)
    }

    #[derive(Default)]
    struct MetadataOnlyReader {
        metadata_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainReader for MetadataOnlyReader {
        async fn bid_for_token_bidder(
            &self,
            _token_id: U256,
            _bidder: Address,
        ) -> Result<OnchainBid, ChainReadError> {
            unreachable!("normalization never reads bids")
        }

        async fn erc20_metadata(&self, token: Address) -> Result<TokenMetadata, ChainReadError> {
            self.metadata_calls.fetch_add(1, Ordering::SeqCst);
            if token == rare() {
                Ok(TokenMetadata::new("RARE", 18, "SuperRare"))
            } else {
                Err(ChainReadError::TokenMetadata {
                    token,
                    message: "execution reverted".to_string(),
                })
            }
        }

        async fn auction(&self, _auction_id: u64) -> Result<OnchainAuction, ChainReadError> {
            unreachable!("normalization never reads auctions")
        }
    }

    fn bid_in(currency: Address, symbol: &str) -> BidRecord {
        BidRecord {
            id: format!("{currency}-{symbol}"),
            transaction_hash: B256::ZERO,
            log_index: 0,
            token_id: U256::from(1),
            token_contract: Address::repeat_byte(0xcc),
            amount: U256::from(10),
            amount_formatted: "0.00000000000000001".to_string(),
            currency,
            currency_symbol: symbol.to_string(),
            currency_decimals: 18,
            bidder: Address::repeat_byte(0xaa),
            recipient: Address::repeat_byte(0xaa),
            token_owner: None,
            timestamp: Some(1_600_000_000),
            block_number: 1,
            is_active: true,
            is_withdrawn: false,
            is_accepted: false,
        }
    }

    #[tokio::test]
    async fn test_placeholders_resolved_through_both_tiers() {
        let reader = MetadataOnlyReader::default();
        let cache = TokenMetadataCache::new();
        let bids = vec![
            bid_in(WETH, "UNKNOWN"),
            bid_in(rare(), "UNK"),
            bid_in(rare(), "UNKNOWN"),
            bid_in(broken(), "UNK"),
            bid_in(Address::repeat_byte(0x55), "DOGE"),
        ];

        let outcome = normalize_currency_symbols(
            bids.clone(),
            &cache,
            &reader,
            &BatchThrottle::unthrottled(5),
            Duration::from_secs(1),
        )
        .await;

        let symbols: Vec<&str> = outcome
            .bids
            .iter()
            .map(|b| b.currency_symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["WETH", "RARE", "RARE", "UNKNOWN", "DOGE"]);
        assert_eq!(outcome.symbols_updated, 3);
        // RARE and BROKEN once each, WETH comes from the static table
        assert_eq!(reader.metadata_calls.load(Ordering::SeqCst), 2);

        // only the symbol may change
        for (before, after) in bids.iter().zip(outcome.bids.iter()) {
            assert_eq!(before.amount, after.amount);
            assert_eq!(before.currency_decimals, after.currency_decimals);
            assert_eq!(before.id, after.id);
        }
    }
}
