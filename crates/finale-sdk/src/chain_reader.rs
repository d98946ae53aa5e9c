//! Read-only access to the deprecated Zora contracts.
//!
//! [`ChainReader`] is the seam the reconciliation engine and batch jobs are written
//! against; [`AlloyChainReader`] is the production implementation over an erased
//! alloy provider. Every error is tagged with the key that failed so that a caller
//! can record it against the right record and carry on with the batch.

use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use finale_bindings::{ERC20Instance, ZoraAuctionHouseInstance, ZoraMarketInstance};
use finale_core::models::AuctionRecord;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainReadError {
    #[error("bidForTokenBidder(tokenId={token_id}, bidder={bidder}) failed: {message}")]
    BidLookup {
        token_id: U256,
        bidder: Address,
        message: String,
    },

    #[error("ERC-20 metadata lookup for {token} failed: {message}")]
    TokenMetadata { token: Address, message: String },

    #[error("auctions({auction_id}) failed: {message}")]
    AuctionLookup { auction_id: u64, message: String },
}

/// The bid struct stored by the Market contract for a (tokenId, bidder) pair.
/// An all-zero bid means nothing is escrowed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnchainBid {
    pub amount: U256,
    pub currency: Address,
    pub bidder: Address,
    pub recipient: Address,
    pub sell_on_share: U256,
}

impl From<finale_bindings::Bid> for OnchainBid {
    fn from(bid: finale_bindings::Bid) -> Self {
        Self {
            amount: bid.amount,
            currency: bid.currency,
            bidder: bid.bidder,
            recipient: bid.recipient,
            sell_on_share: bid.sellOnShare.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
}

impl TokenMetadata {
    pub fn new(symbol: &str, decimals: u8, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            name: name.to_string(),
        }
    }

    /// Substituted whenever a token cannot be resolved.
    pub fn unknown() -> Self {
        Self::new("UNKNOWN", 18, "Unknown Token")
    }
}

/// Auction House `auctions(id)` getter output. Deleted auctions read back zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnchainAuction {
    pub token_id: U256,
    pub token_contract: Address,
    pub approved: bool,
    pub amount: U256,
    pub duration: U256,
    pub first_bid_time: U256,
    pub reserve_price: U256,
    pub curator_fee_percentage: u8,
    pub token_owner: Address,
    pub bidder: Address,
    pub curator: Address,
    pub auction_currency: Address,
}

impl OnchainAuction {
    pub fn exists(&self) -> bool {
        self.token_owner != Address::ZERO
    }

    pub fn into_record(self, auction_id: u64) -> AuctionRecord {
        AuctionRecord {
            auction_id,
            token_id: self.token_id,
            token_contract: self.token_contract,
            amount: self.amount,
            reserve_price: self.reserve_price,
            duration: self.duration.saturating_to::<u64>(),
            first_bid_time: self.first_bid_time.saturating_to::<u64>(),
            curator_fee_percentage: self.curator_fee_percentage,
            auction_currency: self.auction_currency,
            token_owner: self.token_owner,
            bidder: self.bidder,
            curator: self.curator,
            approved: self.approved,
            is_settled: false,
        }
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn bid_for_token_bidder(
        &self,
        token_id: U256,
        bidder: Address,
    ) -> Result<OnchainBid, ChainReadError>;

    async fn erc20_metadata(&self, token: Address) -> Result<TokenMetadata, ChainReadError>;

    async fn auction(&self, auction_id: u64) -> Result<OnchainAuction, ChainReadError>;
}

#[derive(Clone)]
pub struct AlloyChainReader {
    provider: DynProvider,
    market: ZoraMarketInstance<DynProvider>,
    auction_house: ZoraAuctionHouseInstance<DynProvider>,
}

impl AlloyChainReader {
    pub fn new(provider: DynProvider, market_address: Address, auction_house_address: Address) -> Self {
        Self {
            market: ZoraMarketInstance::new(market_address, provider.clone()),
            auction_house: ZoraAuctionHouseInstance::new(auction_house_address, provider.clone()),
            provider,
        }
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    async fn bid_for_token_bidder(
        &self,
        token_id: U256,
        bidder: Address,
    ) -> Result<OnchainBid, ChainReadError> {
        debug!(%token_id, %bidder, "Reading bid from market contract");
        self.market
            .bidForTokenBidder(token_id, bidder)
            .call()
            .await
            .map(OnchainBid::from)
            .map_err(|e| ChainReadError::BidLookup {
                token_id,
                bidder,
                message: e.to_string(),
            })
    }

    async fn erc20_metadata(&self, token: Address) -> Result<TokenMetadata, ChainReadError> {
        debug!(%token, "Reading ERC-20 metadata");
        let erc20 = ERC20Instance::new(token, self.provider.clone());
        let metadata_error = |e: alloy::contract::Error| ChainReadError::TokenMetadata {
            token,
            message: e.to_string(),
        };
        let symbol = erc20.symbol().call().await.map_err(metadata_error)?;
        let decimals = erc20.decimals().call().await.map_err(metadata_error)?;
        let name = erc20.name().call().await.map_err(metadata_error)?;
        Ok(TokenMetadata {
            symbol,
            decimals,
            name,
        })
    }

    async fn auction(&self, auction_id: u64) -> Result<OnchainAuction, ChainReadError> {
        debug!(auction_id, "Reading auction from auction house");
        let auction = self
            .auction_house
            .auctions(U256::from(auction_id))
            .call()
            .await
            .map_err(|e| ChainReadError::AuctionLookup {
                auction_id,
                message: e.to_string(),
            })?;
        Ok(OnchainAuction {
            token_id: auction.tokenId,
            token_contract: auction.tokenContract,
            approved: auction.approved,
            amount: auction.amount,
            duration: auction.duration,
            first_bid_time: auction.firstBidTime,
            reserve_price: auction.reservePrice,
            curator_fee_percentage: auction.curatorFeePercentage,
            token_owner: auction.tokenOwner,
            bidder: auction.bidder,
            curator: auction.curator,
            auction_currency: auction.auctionCurrency,
        })
    }
}
