//! Collapses stale "bid placed" rows for the same (bidder, tokenId) pair.
//!
//! The Market contract keeps at most one bid per pair, so when several verified
//! rows claim the same pair only the latest by (blockNumber, logIndex) can be the
//! one sitting on the contract.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, U256};
use finale_core::models::BidRecord;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Survivors, in input order.
    pub kept: Vec<BidRecord>,
    pub removed: Vec<BidRecord>,
    /// Every member of a group that had more than one row, survivors included.
    pub duplicates_found: usize,
}

impl DedupOutcome {
    pub fn duplicates_removed(&self) -> usize {
        self.removed.len()
    }
}

pub fn deduplicate(bids: Vec<BidRecord>) -> DedupOutcome {
    let mut groups: HashMap<(Address, U256), Vec<usize>> = HashMap::new();
    for (index, bid) in bids.iter().enumerate() {
        groups
            .entry((bid.bidder, bid.token_id))
            .or_default()
            .push(index);
    }

    let mut discarded: HashSet<usize> = HashSet::new();
    let mut duplicates_found = 0;

    for (key, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        duplicates_found += members.len();
        // input index as the final key keeps the winner deterministic on full ties
        members.sort_by_key(|&i| (Reverse(bids[i].chain_position()), i));
        info!(
            message = "Duplicate active bids found",
            bidder = %key.0,
            token_id = %key.1,
            rows = members.len(),
            kept = %bids[members[0]].id
        );
        discarded.extend(members.into_iter().skip(1));
    }

    let mut kept = Vec::with_capacity(bids.len() - discarded.len());
    let mut removed = Vec::with_capacity(discarded.len());
    for (index, bid) in bids.into_iter().enumerate() {
        if discarded.contains(&index) {
            removed.push(bid);
        } else {
            kept.push(bid);
        }
    }

    DedupOutcome {
        kept,
        removed,
        duplicates_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn bid(id: &str, bidder: u8, token_id: u64, block_number: u64, log_index: u64) -> BidRecord {
        BidRecord {
            id: id.to_string(),
            transaction_hash: B256::repeat_byte(bidder),
            log_index,
            token_id: U256::from(token_id),
            token_contract: Address::repeat_byte(0xcc),
            amount: U256::from(100),
            amount_formatted: "0.0000000000000001".to_string(),
            currency: Address::ZERO,
            currency_symbol: "ETH".to_string(),
            currency_decimals: 18,
            bidder: Address::repeat_byte(bidder),
            recipient: Address::repeat_byte(bidder),
            token_owner: None,
            timestamp: None,
            block_number,
            is_active: true,
            is_withdrawn: false,
            is_accepted: false,
        }
    }

    fn kept_ids(outcome: &DedupOutcome) -> Vec<&str> {
        outcome.kept.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_same_block_higher_log_index_wins() {
        let outcome = deduplicate(vec![bid("a", 0xaa, 1, 100, 5), bid("b", 0xaa, 1, 100, 7)]);
        assert_eq!(kept_ids(&outcome), vec!["b"]);
        assert_eq!(outcome.duplicates_found, 2);
        assert_eq!(outcome.duplicates_removed(), 1);
    }

    #[test]
    fn test_later_block_wins_regardless_of_log_index() {
        let outcome = deduplicate(vec![bid("a", 0xaa, 1, 101, 0), bid("b", 0xaa, 1, 100, 99)]);
        assert_eq!(kept_ids(&outcome), vec!["a"]);
    }

    #[test]
    fn test_distinct_pairs_are_untouched_and_keep_order() {
        let outcome = deduplicate(vec![
            bid("a", 0xaa, 1, 100, 0),
            bid("b", 0xbb, 1, 100, 1),
            bid("c", 0xaa, 2, 100, 2),
        ]);
        assert_eq!(kept_ids(&outcome), vec!["a", "b", "c"]);
        assert_eq!(outcome.duplicates_found, 0);
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn test_three_way_group() {
        let outcome = deduplicate(vec![
            bid("old", 0xaa, 9, 10, 0),
            bid("other", 0xbb, 9, 11, 0),
            bid("newest", 0xaa, 9, 12, 0),
            bid("middle", 0xaa, 9, 11, 3),
        ]);
        assert_eq!(kept_ids(&outcome), vec!["other", "newest"]);
        assert_eq!(outcome.duplicates_found, 3);
        assert_eq!(outcome.duplicates_removed(), 2);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let first = deduplicate(vec![
            bid("a", 0xaa, 1, 100, 5),
            bid("b", 0xaa, 1, 100, 7),
            bid("c", 0xbb, 2, 50, 0),
            bid("d", 0xbb, 2, 51, 0),
        ]);
        let second = deduplicate(first.kept.clone());
        assert_eq!(second.kept, first.kept);
        assert_eq!(second.duplicates_found, 0);
        assert!(second.removed.is_empty());
    }
}
