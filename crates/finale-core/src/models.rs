use alloy_primitives::{hex, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::serde_utils::{flex_u64, flex_u64_opt, flex_u8, u256_decimal};

/// Placeholder symbols written by exporters that could not resolve a token.
pub const PLACEHOLDER_SYMBOLS: [&str; 2] = ["UNKNOWN", "UNK"];

/// Lower-cased, 0x-prefixed form used for every persisted address key.
pub fn address_key(address: &Address) -> String {
    hex::encode_prefixed(address)
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Active,
    Withdrawn,
    Accepted,
    Inactive,
}

impl BidStatus {
    /// accepted > withdrawn > active > inactive
    pub fn from_flags(is_active: bool, is_withdrawn: bool, is_accepted: bool) -> Self {
        if is_accepted {
            BidStatus::Accepted
        } else if is_withdrawn {
            BidStatus::Withdrawn
        } else if is_active {
            BidStatus::Active
        } else {
            BidStatus::Inactive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Active => "active",
            BidStatus::Withdrawn => "withdrawn",
            BidStatus::Accepted => "accepted",
            BidStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Debug for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bid placed on the legacy Market contract, as held in snapshots and the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub id: String,
    pub transaction_hash: B256,
    #[serde(with = "flex_u64")]
    pub log_index: u64,

    #[serde(with = "u256_decimal")]
    pub token_id: U256,
    pub token_contract: Address,

    #[serde(with = "u256_decimal")]
    pub amount: U256,
    pub amount_formatted: String,
    pub currency: Address,
    pub currency_symbol: String,
    #[serde(with = "flex_u8")]
    pub currency_decimals: u8,

    pub bidder: Address,
    pub recipient: Address,
    #[serde(default)]
    pub token_owner: Option<Address>,

    #[serde(default, with = "flex_u64_opt")]
    pub timestamp: Option<u64>,
    #[serde(with = "flex_u64")]
    pub block_number: u64,

    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_withdrawn: bool,
    #[serde(default)]
    pub is_accepted: bool,
}

impl BidRecord {
    pub fn status(&self) -> BidStatus {
        BidStatus::from_flags(self.is_active, self.is_withdrawn, self.is_accepted)
    }

    pub fn has_placeholder_symbol(&self) -> bool {
        PLACEHOLDER_SYMBOLS.contains(&self.currency_symbol.as_str())
    }

    /// (blockNumber, logIndex); later events compare greater.
    pub fn chain_position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

impl fmt::Debug for BidRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidRecord")
            .field("id", &self.id)
            .field("token_id", &self.token_id)
            .field("bidder", &self.bidder)
            .field("amount", &self.amount.to_string())
            .field("currency_symbol", &self.currency_symbol)
            .field("block_number", &self.block_number)
            .field("log_index", &self.log_index)
            .field("status", &self.status())
            .finish()
    }
}

/// An Auction House auction. A zero `bidder` means no bid has been placed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionRecord {
    #[serde(with = "flex_u64")]
    pub auction_id: u64,
    #[serde(with = "u256_decimal")]
    pub token_id: U256,
    pub token_contract: Address,

    #[serde(with = "u256_decimal")]
    pub amount: U256,
    #[serde(with = "u256_decimal")]
    pub reserve_price: U256,
    #[serde(with = "flex_u64")]
    pub duration: u64,
    #[serde(with = "flex_u64")]
    pub first_bid_time: u64,
    #[serde(with = "flex_u8")]
    pub curator_fee_percentage: u8,
    pub auction_currency: Address,

    pub token_owner: Address,
    pub bidder: Address,
    pub curator: Address,

    pub approved: bool,
    pub is_settled: bool,
}

impl AuctionRecord {
    pub fn has_bid(&self) -> bool {
        self.bidder != Address::ZERO
    }
}

impl fmt::Debug for AuctionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuctionRecord")
            .field("auction_id", &self.auction_id)
            .field("token_id", &self.token_id)
            .field("token_contract", &self.token_contract)
            .field("token_owner", &self.token_owner)
            .field("bidder", &self.bidder)
            .field("amount", &self.amount.to_string())
            .field("approved", &self.approved)
            .field("is_settled", &self.is_settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_precedence_all_flag_combinations() {
        for is_active in [false, true] {
            for is_withdrawn in [false, true] {
                for is_accepted in [false, true] {
                    let expected = if is_accepted {
                        BidStatus::Accepted
                    } else if is_withdrawn {
                        BidStatus::Withdrawn
                    } else if is_active {
                        BidStatus::Active
                    } else {
                        BidStatus::Inactive
                    };
                    assert_eq!(
                        BidStatus::from_flags(is_active, is_withdrawn, is_accepted),
                        expected,
                        "flags active={is_active} withdrawn={is_withdrawn} accepted={is_accepted}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_address_key_is_lowercase() {
        let address: Address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
            .parse()
            .unwrap();
        assert_eq!(
            address_key(&address),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
    }

    #[test]
    fn test_bid_status_serializes_lowercase() {
        let json = serde_json::to_string(&BidStatus::Withdrawn).unwrap();
        assert_eq!(json, "\"withdrawn\"");
    }
}
