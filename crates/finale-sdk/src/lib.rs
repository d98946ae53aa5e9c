pub mod chain_reader;
mod errors;
pub mod throttle;
pub mod token_metadata;

pub use errors::{FinaleSdkError, Result};

use alloy::providers::Provider;
use alloy::providers::{DynProvider, ProviderBuilder, WsConnect};
use alloy::pubsub::{ConnectionHandle, PubSubConnect};
use alloy::rpc::client::ClientBuilder;
use alloy::transports::{impl_future, TransportResult};
use backoff::exponential::ExponentialBackoff;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where to store the database (in-memory or on disk).
pub enum DatabaseLocation {
    InMemory,
    Directory(String),
}

impl FromStr for DatabaseLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(DatabaseLocation::InMemory),
            s => Ok(DatabaseLocation::Directory(s.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetryWsConnect(WsConnect);

impl PubSubConnect for RetryWsConnect {
    fn is_local(&self) -> bool {
        self.0.is_local()
    }

    fn connect(&self) -> impl_future!(<Output = TransportResult<ConnectionHandle>>) {
        self.0.connect()
    }

    async fn try_reconnect(&self) -> TransportResult<ConnectionHandle> {
        backoff::future::retry(
            ExponentialBackoff::<backoff::SystemClock>::default(),
            || async { Ok(self.0.try_reconnect().await?) },
        )
        .await
    }
}

/// Creates a type erased websocket provider
pub async fn create_websocket_provider(evm_rpc_websocket_url: &str) -> Result<DynProvider> {
    let ws = RetryWsConnect(WsConnect::new(evm_rpc_websocket_url));
    let client = ClientBuilder::default()
        .pubsub(ws)
        .await
        .map_err(|e| FinaleSdkError::WebsocketProviderError(e.to_string()))?;

    Ok(ProviderBuilder::new().on_client(client).erased())
}

/// Creates a type erased provider over plain HTTP JSON-RPC
pub fn create_http_provider(evm_rpc_http_url: &str) -> Result<DynProvider> {
    let url = evm_rpc_http_url
        .parse()
        .map_err(|e| FinaleSdkError::HttpProviderError(format!("{e}")))?;
    Ok(ProviderBuilder::new().on_http(url).erased())
}

/// Picks the transport from the url scheme, the batch jobs accept either.
pub async fn create_provider(evm_rpc_url: &str) -> Result<DynProvider> {
    if evm_rpc_url.starts_with("ws://") || evm_rpc_url.starts_with("wss://") {
        create_websocket_provider(evm_rpc_url).await
    } else if evm_rpc_url.starts_with("http://") || evm_rpc_url.starts_with("https://") {
        create_http_provider(evm_rpc_url)
    } else {
        Err(FinaleSdkError::UnsupportedRpcUrl(evm_rpc_url.to_string()))
    }
}

pub fn handle_background_thread_result<T>(
    result: Option<std::result::Result<std::result::Result<T, eyre::Report>, tokio::task::JoinError>>,
) -> eyre::Result<()> {
    match result {
        Some(Ok(thread_result)) => match thread_result {
            Ok(_) => Err(eyre::eyre!("Background thread completed unexpectedly")),
            Err(e) => Err(eyre::eyre!("Background thread panicked: {}", e)),
        },
        Some(Err(e)) => Err(eyre::eyre!("Join set failed: {}", e)),
        None => Err(eyre::eyre!("Join set panicked with no result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_location_from_str() {
        assert_eq!(
            DatabaseLocation::from_str("memory").unwrap(),
            DatabaseLocation::InMemory
        );
        assert_eq!(
            DatabaseLocation::from_str("/var/lib/finale").unwrap(),
            DatabaseLocation::Directory("/var/lib/finale".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_provider_rejects_unknown_scheme() {
        let err = create_provider("ipc:///tmp/geth.ipc").await.unwrap_err();
        assert!(matches!(err, FinaleSdkError::UnsupportedRpcUrl(_)));
    }
}
