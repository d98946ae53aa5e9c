use std::time::Duration;

use alloy::primitives::U256;
use finale_core::models::BidRecord;
use finale_sdk::chain_reader::{ChainReadError, ChainReader};
use finale_sdk::throttle::BatchThrottle;
use serde::Serialize;
use tracing::warn;

/// Outcome of checking one snapshot bid against the live Market contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    #[serde(flatten)]
    pub bid: BidRecord,
    pub is_active: bool,
    #[serde(serialize_with = "serialize_opt_u256")]
    pub contract_amount: Option<U256>,
    pub amount_matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_opt_u256<S: serde::Serializer>(
    value: &Option<U256>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}

/// A bid is live only if the contract still escrows exactly the recorded amount.
/// Any other amount means the recorded bid was withdrawn or replaced.
pub fn is_active_on_contract(snapshot_amount: U256, contract_amount: U256) -> bool {
    !contract_amount.is_zero() && contract_amount == snapshot_amount
}

pub(crate) async fn verify_bid(
    reader: &dyn ChainReader,
    bid: &BidRecord,
    call_timeout: Duration,
) -> VerificationResult {
    let lookup = tokio::time::timeout(
        call_timeout,
        reader.bid_for_token_bidder(bid.token_id, bid.bidder),
    )
    .await
    .unwrap_or_else(|_| {
        Err(ChainReadError::BidLookup {
            token_id: bid.token_id,
            bidder: bid.bidder,
            message: format!("timed out after {:?}", call_timeout),
        })
    });

    match lookup {
        Ok(onchain) => VerificationResult {
            bid: bid.clone(),
            is_active: is_active_on_contract(bid.amount, onchain.amount),
            contract_amount: Some(onchain.amount),
            amount_matches: onchain.amount == bid.amount,
            error: None,
        },
        Err(e) => {
            warn!(bid_id = %bid.id, "Bid verification failed: {}", e);
            VerificationResult {
                bid: bid.clone(),
                is_active: false,
                contract_amount: None,
                amount_matches: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Verifies every bid, results in snapshot order. Never fails as a whole.
pub async fn verify_bids(
    reader: &dyn ChainReader,
    bids: &[BidRecord],
    throttle: &BatchThrottle,
    call_timeout: Duration,
) -> Vec<VerificationResult> {
    throttle
        .run(bids.iter().collect(), |bid| verify_bid(reader, bid, call_timeout))
        .await
}
