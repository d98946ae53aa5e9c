use std::sync::Arc;

use alloy::primitives::{Address, U256};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use finale_core::snapshot::parse_snapshot;
use finale_indexer::FinaleIndexer;
use finale_indexer_server::{get_address, AppState};
use finale_sdk::chain_reader::OnchainAuction;
use finale_sdk::throttle::BatchThrottle;
use finale_sdk::token_metadata::TokenMetadataCache;
use finale_sdk::DatabaseLocation;

use crate::test_helpers::fake_reader::FakeChainReader;

const COLLECTOR: &str = "0xc011ec70c011ec70c011ec70c011ec70c011ec70";
const CREATOR: &str = "0xc4ea70c4ea70c4ea70c4ea70c4ea70c4ea70c4ea";

fn snapshot_json() -> String {
    format!(
        r#"[
        {{
            "id": "0xaa-1",
            "transactionHash": "0x{tx}",
            "logIndex": "1",
            "tokenId": "42",
            "tokenContract": "0xabEFBc9fD2F806065b4f3C237d4b59D9A97Bcac7",
            "amount": "1000000000000000000",
            "amountFormatted": "1.0",
            "currency": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "currencySymbol": "WETH",
            "currencyDecimals": 18,
            "bidder": "{collector}",
            "recipient": "{collector}",
            "tokenOwner": "{creator}",
            "timestamp": 1610000000,
            "blockNumber": "11600000",
            "isActive": true
        }},
        {{
            "id": "0xbb-4",
            "transactionHash": "0x{tx}",
            "logIndex": 4,
            "tokenId": "43",
            "tokenContract": "0xabEFBc9fD2F806065b4f3C237d4b59D9A97Bcac7",
            "amount": "5",
            "amountFormatted": "0.000000000000000005",
            "currency": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "currencySymbol": "WETH",
            "currencyDecimals": "18",
            "bidder": "{collector}",
            "recipient": "{collector}",
            "tokenOwner": "{collector}",
            "blockNumber": 11600100,
            "isActive": true,
            "isWithdrawn": true
        }}
    ]"#,
        tx = "ab".repeat(32),
        collector = format!("0x{}", COLLECTOR[2..].to_uppercase()),
        creator = CREATOR,
    )
}

async fn seeded_state() -> AppState {
    let indexer = FinaleIndexer::open(
        &DatabaseLocation::InMemory,
        Arc::new(TokenMetadataCache::new()),
    )
    .await
    .unwrap();

    let bids = parse_snapshot(&snapshot_json()).unwrap();
    assert_eq!(indexer.import_snapshot(&bids).await.unwrap(), 2);

    let collector: Address = COLLECTOR.parse().unwrap();
    let creator: Address = CREATOR.parse().unwrap();
    let reader = FakeChainReader::new()
        .with_auction(
            1,
            OnchainAuction {
                token_id: U256::from(42u64),
                token_contract: Address::repeat_byte(0xab),
                approved: true,
                amount: U256::from(3u64),
                duration: U256::from(86_400u64),
                first_bid_time: U256::from(1_610_000_000u64),
                reserve_price: U256::from(1u64),
                curator_fee_percentage: 0,
                token_owner: creator,
                bidder: collector,
                curator: Address::ZERO,
                auction_currency: Address::ZERO,
            },
        )
        .with_auction(
            2,
            OnchainAuction {
                token_id: U256::from(44u64),
                token_contract: Address::repeat_byte(0xab),
                approved: true,
                duration: U256::from(86_400u64),
                reserve_price: U256::from(1u64),
                // collector curates an auction of their own token
                token_owner: collector,
                curator: collector,
                ..Default::default()
            },
        );
    let summary = indexer
        .sync_auctions(&reader, 0, 3, &BatchThrottle::unthrottled(2))
        .await
        .unwrap();
    assert_eq!(summary.stored, 2);
    assert_eq!(summary.empty, 2);

    AppState {
        indexer: Arc::new(indexer),
    }
}

async fn lookup(state: &AppState, address: &str) -> (StatusCode, serde_json::Value) {
    let response = get_address(State(state.clone()), Path(address.to_string())).await;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_collector_sees_every_record_once() {
    let state = seeded_state().await;
    let (status, body) = lookup(&state, COLLECTOR).await;
    assert_eq!(status, StatusCode::OK);

    let auctions = body["auctions"].as_array().unwrap();
    assert_eq!(auctions.len(), 2);
    let bids = body["bids"].as_array().unwrap();
    assert_eq!(bids.len(), 2);

    // newest first
    assert_eq!(bids[0]["id"], "0xbb-4");
    assert_eq!(bids[0]["status"], "withdrawn");
    assert_eq!(bids[1]["status"], "active");

    let breakdown = &body["breakdown"];
    assert_eq!(breakdown["auctionsAsTokenOwner"], 1);
    assert_eq!(breakdown["auctionsAsCurator"], 1);
    assert_eq!(breakdown["auctionsAsBidder"], 1);
    assert_eq!(breakdown["bidsAsBidder"], 2);
    assert_eq!(breakdown["bidsAsTokenOwner"], 1);
    assert_eq!(breakdown["totalAuctions"], 2);
    assert_eq!(breakdown["totalBids"], 2);
}

#[tokio::test]
async fn test_creator_lookup_in_any_case() {
    let state = seeded_state().await;
    let upper = format!("0x{}", CREATOR[2..].to_uppercase());
    for address in [CREATOR.to_string(), upper] {
        let (status, body) = lookup(&state, &address).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["breakdown"]["auctionsAsTokenOwner"], 1);
        assert_eq!(body["breakdown"]["bidsAsTokenOwner"], 1);
        assert_eq!(body["breakdown"]["bidsAsBidder"], 0);
        assert_eq!(body["bids"][0]["id"], "0xaa-1");
    }
}

#[tokio::test]
async fn test_malformed_address_rejected() {
    let state = seeded_state().await;
    let (status, body) = lookup(&state, "0x1111").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_settled_flag_visible_in_lookup() {
    let state = seeded_state().await;
    assert!(state.indexer.mark_auction_settled(1).await.unwrap());

    let (_, body) = lookup(&state, CREATOR).await;
    assert_eq!(body["auctions"][0]["isSettled"], true);
}
