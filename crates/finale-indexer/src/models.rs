use alloy::primitives::Address;
use finale_core::models::{AuctionRecord, BidRecord, BidStatus};
use serde::{Deserialize, Serialize};

/// A stored bid together with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidWithStatus {
    #[serde(flatten)]
    pub bid: BidRecord,
    pub status: BidStatus,
}

impl From<BidRecord> for BidWithStatus {
    fn from(bid: BidRecord) -> Self {
        let status = bid.status();
        Self { bid, status }
    }
}

/// Independent per-role tallies. A record matching several roles is counted
/// once per role, so the role counts may add up to more than the totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBreakdown {
    pub auctions_as_token_owner: usize,
    pub auctions_as_curator: usize,
    pub auctions_as_bidder: usize,
    pub bids_as_bidder: usize,
    pub bids_as_token_owner: usize,
    pub total_auctions: usize,
    pub total_bids: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLookup {
    pub address: Address,
    pub auctions: Vec<AuctionRecord>,
    pub bids: Vec<BidWithStatus>,
    pub breakdown: RoleBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionRole {
    TokenOwner,
    Curator,
    Bidder,
}

impl AuctionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionRole::TokenOwner => "token_owner",
            AuctionRole::Curator => "curator",
            AuctionRole::Bidder => "bidder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidRole {
    Bidder,
    TokenOwner,
}

impl BidRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidRole::Bidder => "bidder",
            BidRole::TokenOwner => "token_owner",
        }
    }
}
