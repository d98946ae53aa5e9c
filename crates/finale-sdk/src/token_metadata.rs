//! Two-tier currency metadata resolution: a static table of well-known tokens,
//! then an ERC-20 read through the [`ChainReader`], memoized per run in an
//! explicit [`TokenMetadataCache`].

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{address, Address};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chain_reader::{ChainReadError, ChainReader, TokenMetadata};

pub const ETH_SENTINEL: Address = Address::ZERO;
pub const DAI: Address = address!("0x6B175474E89094C44Da98b954EedeAC495271d0F");
pub const USDC: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const WBTC: Address = address!("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");

// (address, symbol, decimals, name)
const WELL_KNOWN_TOKENS: [(Address, &str, u8, &str); 5] = [
    (ETH_SENTINEL, "ETH", 18, "Ether"),
    (DAI, "DAI", 18, "Dai Stablecoin"),
    (USDC, "USDC", 6, "USD Coin"),
    (WETH, "WETH", 18, "Wrapped Ether"),
    (WBTC, "WBTC", 8, "Wrapped BTC"),
];

pub fn well_known_token(token: &Address) -> Option<TokenMetadata> {
    WELL_KNOWN_TOKENS
        .iter()
        .find(|(known, ..)| known == token)
        .map(|(_, symbol, decimals, name)| TokenMetadata::new(symbol, *decimals, name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Static,
    Chain,
    /// The chain lookup failed and the sentinel was substituted.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub metadata: TokenMetadata,
    pub source: TokenSource,
}

impl ResolvedToken {
    pub fn is_authoritative(&self) -> bool {
        self.source != TokenSource::Fallback
    }
}

/// Append-only; entries are never invalidated. Failed lookups are cached as
/// fallbacks so a broken token contract is only ever queried once per cache.
#[derive(Debug, Default)]
pub struct TokenMetadataCache {
    entries: RwLock<HashMap<Address, ResolvedToken>>,
}

impl TokenMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static table or cache only, never touches the network.
    pub async fn peek(&self, token: &Address) -> Option<ResolvedToken> {
        if let Some(metadata) = well_known_token(token) {
            return Some(ResolvedToken {
                metadata,
                source: TokenSource::Static,
            });
        }
        self.entries.read().await.get(token).cloned()
    }

    /// A chain read that outlives `call_timeout` is treated like a failed one.
    pub async fn resolve(
        &self,
        token: Address,
        reader: &dyn ChainReader,
        call_timeout: Duration,
    ) -> ResolvedToken {
        if let Some(resolved) = self.peek(&token).await {
            return resolved;
        }

        let lookup = tokio::time::timeout(call_timeout, reader.erc20_metadata(token))
            .await
            .unwrap_or_else(|_| {
                Err(ChainReadError::TokenMetadata {
                    token,
                    message: format!("timed out after {:?}", call_timeout),
                })
            });

        let resolved = match lookup {
            Ok(metadata) => {
                info!(
                    message = "Resolved token metadata",
                    token = %token,
                    symbol = %metadata.symbol,
                    decimals = metadata.decimals
                );
                ResolvedToken {
                    metadata,
                    source: TokenSource::Chain,
                }
            }
            Err(e) => {
                warn!("Token metadata lookup failed, using fallback: {}", e);
                ResolvedToken {
                    metadata: TokenMetadata::unknown(),
                    source: TokenSource::Fallback,
                }
            }
        };

        self.entries
            .write()
            .await
            .entry(token)
            .or_insert(resolved)
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_table_covers_well_known_tokens() {
        assert_eq!(well_known_token(&ETH_SENTINEL).unwrap().symbol, "ETH");
        assert_eq!(well_known_token(&WETH).unwrap().symbol, "WETH");
        assert_eq!(well_known_token(&USDC).unwrap().decimals, 6);
        assert_eq!(well_known_token(&WBTC).unwrap().decimals, 8);
        assert_eq!(well_known_token(&DAI).unwrap().name, "Dai Stablecoin");
        assert!(well_known_token(&Address::repeat_byte(0x42)).is_none());
    }

    #[tokio::test]
    async fn test_peek_does_not_cache_static_entries() {
        let cache = TokenMetadataCache::new();
        let resolved = cache.peek(&WETH).await.unwrap();
        assert_eq!(resolved.source, TokenSource::Static);
        assert!(cache.is_empty().await);
    }

    struct StalledTokenReader;

    #[async_trait::async_trait]
    impl ChainReader for StalledTokenReader {
        async fn bid_for_token_bidder(
            &self,
            _token_id: alloy::primitives::U256,
            _bidder: Address,
        ) -> Result<crate::chain_reader::OnchainBid, ChainReadError> {
            unreachable!("only token metadata is read")
        }

        async fn erc20_metadata(&self, _token: Address) -> Result<TokenMetadata, ChainReadError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(TokenMetadata::new("LATE", 18, "Late Token"))
        }

        async fn auction(
            &self,
            _auction_id: u64,
        ) -> Result<crate::chain_reader::OnchainAuction, ChainReadError> {
            unreachable!("only token metadata is read")
        }
    }

    #[tokio::test]
    async fn test_stalled_metadata_read_times_out_to_fallback() {
        let cache = TokenMetadataCache::new();
        let token = Address::repeat_byte(0x42);

        let resolved = tokio::time::timeout(
            Duration::from_secs(5),
            cache.resolve(token, &StalledTokenReader, Duration::from_millis(50)),
        )
        .await
        .expect("resolve must not wait on the stalled call");

        assert_eq!(resolved.source, TokenSource::Fallback);
        assert_eq!(resolved.metadata, TokenMetadata::unknown());
        assert_eq!(cache.peek(&token).await, Some(resolved));
    }
}
