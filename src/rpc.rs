//! RPC provider management and the range-fetch capability used by the scanner.
//!
//! This module handles connection to Ethereum nodes via HTTP RPC and exposes
//! [`RangeFetcher`], the only seam between the scan loop and the network.
//! Implementations perform a single attempt per call; retries and backoff are
//! the [`scanner`](crate::scanner)'s job.
//!
//! ## Example
//!
//! ```no_run
//! use usdn_rebase_tracker::config::USDN_CONTRACT_ADDRESS;
//! use usdn_rebase_tracker::error::TrackerResult;
//! use usdn_rebase_tracker::rpc::{create_provider, get_latest_block, RangeFetcher, RpcRangeFetcher};
//!
//! # async fn example() -> TrackerResult<()> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY").await?;
//! let latest_block = get_latest_block(&provider).await?;
//!
//! let fetcher = RpcRangeFetcher::new(provider, USDN_CONTRACT_ADDRESS);
//! let logs = fetcher.query_range(latest_block - 1000, latest_block).await?;
//! println!("{} Rebase logs in the last 1000 blocks", logs.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{TrackerError, TrackerResult};
use crate::events::create_rebase_filter;
use alloy::primitives::Address;
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Log};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

/// Type alias for the HTTP provider.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new Ethereum RPC provider connected via HTTP.
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> TrackerResult<Provider> {
    info!("Initializing RPC provider");

    // Keep the API key out of logs
    let host = rpc_url.split("/v2/").next().unwrap_or("unknown");
    tracing::Span::current().record("rpc_host", host);

    let url = rpc_url.parse().map_err(|e| {
        let msg = if rpc_url.starts_with("http") {
            format!("Failed to parse RPC URL: '{host}'")
        } else {
            format!(
                "Invalid RPC URL: '{host}'. Expected format: 'https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY'"
            )
        };
        TrackerError::rpc(msg, Some(Box::new(e)))
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized successfully");

    Ok(provider)
}

/// Get the latest block number from the Ethereum network.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
pub async fn get_latest_block(provider: &Provider) -> TrackerResult<u64> {
    debug!("Fetching latest block number");

    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| TrackerError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    info!(block_number, "Latest block number");

    Ok(block_number)
}

/// Check if the provider connection is healthy by fetching the latest block.
///
/// # Errors
///
/// Returns an error if the RPC connection is not working.
pub async fn check_connection(provider: &Provider) -> TrackerResult<()> {
    debug!("Checking provider connection health");

    match get_latest_block(provider).await {
        Ok(block) => {
            info!("Connection check successful - latest block: {}", block);
            Ok(())
        }
        Err(e) => {
            warn!("Connection check failed: {}", e);
            Err(TrackerError::rpc(
                format!("Provider connection health check failed: {e}"),
                None,
            ))
        }
    }
}

/// Remote log capability consumed by the batch scanner.
///
/// Both methods make exactly one attempt and report any failure as an error.
#[async_trait]
pub trait RangeFetcher: Send + Sync {
    /// Fetch every matching log in the closed range `[from_block, to_block]`,
    /// in block order.
    async fn query_range(&self, from_block: u64, to_block: u64) -> TrackerResult<Vec<Log>>;

    /// Fetch the unix timestamp (seconds) of `block_number`.
    async fn block_timestamp(&self, block_number: u64) -> TrackerResult<u64>;
}

/// [`RangeFetcher`] backed by an HTTP provider, filtered to one contract's
/// `Rebase` logs.
#[derive(Debug, Clone)]
pub struct RpcRangeFetcher {
    provider: Provider,
    contract: Address,
}

impl RpcRangeFetcher {
    /// Create a fetcher for `Rebase` logs emitted by `contract`.
    #[must_use]
    pub const fn new(provider: Provider, contract: Address) -> Self {
        Self { provider, contract }
    }

    /// The underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl RangeFetcher for RpcRangeFetcher {
    async fn query_range(&self, from_block: u64, to_block: u64) -> TrackerResult<Vec<Log>> {
        let filter = create_rebase_filter(self.contract, from_block, to_block);

        let logs = self.provider.get_logs(&filter).await.map_err(|e| {
            TrackerError::rpc(
                format!("Failed to fetch logs for blocks {from_block} to {to_block}"),
                Some(Box::new(e)),
            )
        })?;

        debug!(from_block, to_block, count = logs.len(), "Fetched logs");

        Ok(logs)
    }

    async fn block_timestamp(&self, block_number: u64) -> TrackerResult<u64> {
        let block = self
            .provider
            .get_block_by_number(block_number.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| {
                TrackerError::rpc(
                    format!("Failed to fetch block {block_number}"),
                    Some(Box::new(e)),
                )
            })?
            .ok_or_else(|| TrackerError::rpc(format!("Block {block_number} not found"), None))?;

        Ok(block.header.timestamp)
    }
}
