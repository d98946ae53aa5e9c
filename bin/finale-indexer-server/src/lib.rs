use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use eyre::Result;
use finale_core::parse_address;
use finale_core::snapshot::load_snapshot;
use finale_indexer::FinaleIndexer;
use finale_sdk::token_metadata::TokenMetadataCache;
use finale_sdk::DatabaseLocation;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Database location, one of "memory" or a path to a directory
    #[arg(long, env)]
    pub database_location: DatabaseLocation,

    /// Socket address the HTTP server binds to
    #[arg(long, env, default_value = "0.0.0.0:3001")]
    pub listen_address: SocketAddr,

    /// Snapshot file imported into the store before serving
    #[arg(long, env)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<FinaleIndexer>,
}

pub struct FinaleIndexerServer {
    pub indexer: Arc<FinaleIndexer>,
}

impl FinaleIndexerServer {
    pub async fn start(
        config: ServerConfig,
        join_set: &mut JoinSet<eyre::Result<()>>,
    ) -> Result<Self> {
        let indexer = Arc::new(
            FinaleIndexer::open(
                &config.database_location,
                Arc::new(TokenMetadataCache::new()),
            )
            .await?,
        );

        if let Some(snapshot) = &config.snapshot {
            let bids = load_snapshot(snapshot)?;
            let imported = indexer.import_snapshot(&bids).await?;
            info!(imported, path = %snapshot.display(), "Imported snapshot before serving");
        }

        let listener = tokio::net::TcpListener::bind(config.listen_address).await?;
        info!("Listening on {}", config.listen_address);

        let app = router(indexer.clone());
        join_set.spawn(
            async move {
                axum::serve(listener, app).await?;
                Ok(())
            }
            .instrument(info_span!("Address Lookup Server")),
        );

        Ok(Self { indexer })
    }
}

pub fn router(indexer: Arc<FinaleIndexer>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/address/:address", get(get_address))
        .layer(cors)
        .with_state(AppState { indexer })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    let Ok(address) = parse_address(&address) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid Ethereum address format" })),
        )
            .into_response();
    };

    match state.indexer.lookup_address(address).await {
        Ok(lookup) => Json(lookup).into_response(),
        Err(e) => {
            warn!(%address, error = %e, "Address lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use finale_core::models::AuctionRecord;

    async fn state_with_auction() -> AppState {
        let indexer = FinaleIndexer::open(
            &DatabaseLocation::InMemory,
            Arc::new(TokenMetadataCache::new()),
        )
        .await
        .unwrap();
        let auction = AuctionRecord {
            auction_id: 1,
            token_id: U256::from(3u64),
            token_contract: Address::repeat_byte(0x0d),
            amount: U256::ZERO,
            reserve_price: U256::from(1u64),
            duration: 60,
            first_bid_time: 0,
            curator_fee_percentage: 0,
            auction_currency: Address::ZERO,
            token_owner: Address::repeat_byte(0xab),
            bidder: Address::ZERO,
            curator: Address::ZERO,
            approved: true,
            is_settled: false,
        };
        finale_indexer::db::upsert_auction(&indexer.database_connection, &auction)
            .await
            .unwrap();
        AppState {
            indexer: Arc::new(indexer),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_address_is_bad_request() {
        let state = state_with_auction().await;
        for input in ["0x1234", "abababababababababababababababababababab", "0xZZabababababababababababababababababab"] {
            let response = get_address(State(state.clone()), Path(input.to_string())).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{input}");
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let state = state_with_auction().await;
        for input in [
            "0xabababababababababababababababababababab",
            "0xABABABABABABABABABABABABABABABABABABABAB",
        ] {
            let response = get_address(State(state.clone()), Path(input.to_string())).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["auctions"].as_array().unwrap().len(), 1);
            assert_eq!(body["breakdown"]["auctionsAsTokenOwner"], 1);
            assert_eq!(body["breakdown"]["totalBids"], 0);
        }
    }
}
