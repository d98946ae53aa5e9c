use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use finale_sdk::chain_reader::{
    ChainReadError, ChainReader, OnchainAuction, OnchainBid, TokenMetadata,
};

#[derive(Debug, Clone)]
enum BidResponse {
    Amount(U256),
    Fail(String),
    Stall(Duration),
}

/// In-memory chain. Bid pairs that were never configured read back as the
/// Market's empty bid (zero amount).
#[derive(Default)]
pub struct FakeChainReader {
    bids: HashMap<(U256, Address), BidResponse>,
    tokens: HashMap<Address, TokenMetadata>,
    stalled_tokens: HashMap<Address, Duration>,
    auctions: HashMap<u64, OnchainAuction>,
    bid_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl FakeChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bid_amount(mut self, token_id: u64, bidder: Address, amount: u64) -> Self {
        self.bids.insert(
            (U256::from(token_id), bidder),
            BidResponse::Amount(U256::from(amount)),
        );
        self
    }

    pub fn with_failing_bid(mut self, token_id: u64, bidder: Address, message: &str) -> Self {
        self.bids.insert(
            (U256::from(token_id), bidder),
            BidResponse::Fail(message.to_string()),
        );
        self
    }

    pub fn with_stalled_bid(mut self, token_id: u64, bidder: Address, stall: Duration) -> Self {
        self.bids
            .insert((U256::from(token_id), bidder), BidResponse::Stall(stall));
        self
    }

    pub fn with_token(mut self, token: Address, metadata: TokenMetadata) -> Self {
        self.tokens.insert(token, metadata);
        self
    }

    pub fn with_stalled_token(mut self, token: Address, stall: Duration) -> Self {
        self.stalled_tokens.insert(token, stall);
        self
    }

    pub fn with_auction(mut self, auction_id: u64, auction: OnchainAuction) -> Self {
        self.auctions.insert(auction_id, auction);
        self
    }

    pub fn bid_calls(&self) -> usize {
        self.bid_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for FakeChainReader {
    async fn bid_for_token_bidder(
        &self,
        token_id: U256,
        bidder: Address,
    ) -> Result<OnchainBid, ChainReadError> {
        self.bid_calls.fetch_add(1, Ordering::SeqCst);
        match self.bids.get(&(token_id, bidder)).cloned() {
            None => Ok(OnchainBid::default()),
            Some(BidResponse::Amount(amount)) => Ok(OnchainBid {
                amount,
                bidder,
                ..Default::default()
            }),
            Some(BidResponse::Fail(message)) => Err(ChainReadError::BidLookup {
                token_id,
                bidder,
                message,
            }),
            Some(BidResponse::Stall(stall)) => {
                tokio::time::sleep(stall).await;
                Ok(OnchainBid::default())
            }
        }
    }

    async fn erc20_metadata(&self, token: Address) -> Result<TokenMetadata, ChainReadError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stalled_tokens.get(&token) {
            tokio::time::sleep(*stall).await;
        }
        self.tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| ChainReadError::TokenMetadata {
                token,
                message: "execution reverted".to_string(),
            })
    }

    async fn auction(&self, auction_id: u64) -> Result<OnchainAuction, ChainReadError> {
        Ok(self.auctions.get(&auction_id).cloned().unwrap_or_default())
    }
}
