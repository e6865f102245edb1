//! Configuration management for the rebase tracker.
//!
//! This module handles loading and validating configuration from environment variables
//! using the `dotenvy` crate. All operations return [`TrackerResult`] for comprehensive
//! error handling.
//!
//! ## Environment Variables
//!
//! Required (one of):
//! - `RPC_URL`: Full HTTP(S) Ethereum RPC endpoint (takes precedence)
//! - `ALCHEMY_API_KEY`: Alchemy API key, expanded to a mainnet endpoint
//!
//! Optional (with defaults):
//! - `USDN_CONTRACT_ADDRESS`: Contract emitting `Rebase` (default: USDN mainnet)
//! - `START_BLOCK`: First block to scan (default: 21436997)
//! - `END_BLOCK`: Last block to scan, inclusive (default: chain head at start)
//! - `BATCH_SIZE`: Initial blocks per `eth_getLogs` query (default: 1000000)
//! - `MIN_BATCH_SIZE`: Floor for batch size backoff (default: 1000)
//! - `MAX_RETRIES_AT_FLOOR`: Consecutive failures tolerated at the floor (default: unbounded)
//! - `RETRY_DELAY_MS`: Base delay between retries in milliseconds (default: 500)
//!
//! ## Example
//!
//! ```no_run
//! use usdn_rebase_tracker::config::Config;
//! use usdn_rebase_tracker::error::TrackerResult;
//!
//! # fn main() -> TrackerResult<()> {
//! let config = Config::from_env()?;
//! println!("Scanning from block {}", config.start_block());
//! # Ok(())
//! # }
//! ```

use crate::error::{TrackerError, TrackerResult};
use crate::scanner::{BackoffPolicy, DEFAULT_MIN_BATCH_SIZE};
use alloy::primitives::{address, Address};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// USDN token contract on Ethereum mainnet.
pub const USDN_CONTRACT_ADDRESS: Address = address!("de17a000ba631c5d7c2bd9fb692efea52d90dee2");

/// Block the USDN contract was deployed around; nothing to find before it.
pub const DEFAULT_START_BLOCK: u64 = 21_436_997;

/// Initial number of blocks requested per range query.
pub const DEFAULT_BATCH_SIZE: u64 = 1_000_000;

/// Base delay between retries of a failed range query.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

const API_KEY_PLACEHOLDER: &str = "your_alchemy_api_key_here";

/// Runtime configuration for a scan.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ethereum RPC URL
    rpc_url: String,

    /// Contract whose `Rebase` logs are scanned
    contract_address: Address,

    /// First block to scan
    start_block: u64,

    /// Last block to scan (inclusive); `None` means the chain head
    end_block: Option<u64>,

    /// Initial blocks per query
    batch_size: u64,

    /// Backoff floor
    min_batch_size: u64,

    /// Consecutive failures tolerated at the floor before giving up
    max_retries_at_floor: Option<u32>,

    /// Base delay between retries
    retry_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` using `dotenvy` (if present) and then delegates to
    /// [`Config::from_lookup`] with the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no RPC endpoint is configured or any value is invalid.
    pub fn from_env() -> TrackerResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither `RPC_URL` nor a real `ALCHEMY_API_KEY` is provided
    /// - `USDN_CONTRACT_ADDRESS` is not a valid address
    /// - A numeric variable does not parse
    /// - The resulting configuration fails [`Config::validate`]
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::config::Config;
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "RPC_URL" => Some("http://localhost:8545".to_string()),
    ///     "START_BLOCK" => Some("100".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.start_block(), 100);
    /// assert_eq!(config.end_block(), None);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> TrackerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = resolve_rpc_url(&lookup)?;

        let contract_address = match lookup("USDN_CONTRACT_ADDRESS") {
            Some(raw) => Address::from_str(raw.trim()).map_err(|e| {
                TrackerError::config(
                    format!("USDN_CONTRACT_ADDRESS must be a valid Ethereum address, got: {raw}"),
                    Some(Box::new(e)),
                )
            })?,
            None => USDN_CONTRACT_ADDRESS,
        };

        let start_block = parse_var(&lookup, "START_BLOCK")?.unwrap_or(DEFAULT_START_BLOCK);
        let end_block = parse_var(&lookup, "END_BLOCK")?;
        let batch_size = parse_var(&lookup, "BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        let min_batch_size =
            parse_var(&lookup, "MIN_BATCH_SIZE")?.unwrap_or(DEFAULT_MIN_BATCH_SIZE);
        let max_retries_at_floor = parse_var(&lookup, "MAX_RETRIES_AT_FLOOR")?;
        let retry_delay_ms =
            parse_var(&lookup, "RETRY_DELAY_MS")?.unwrap_or(DEFAULT_RETRY_DELAY_MS);

        let config = Self {
            rpc_url,
            contract_address,
            start_block,
            end_block,
            batch_size,
            min_batch_size,
            max_retries_at_floor,
            retry_delay: Duration::from_millis(retry_delay_ms),
        };
        config.validate()?;

        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if a batch size is zero. An end block before the start
    /// block is accepted and scans nothing.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.batch_size == 0 {
            return Err(TrackerError::config("BATCH_SIZE must be greater than zero", None));
        }
        if self.min_batch_size == 0 {
            return Err(TrackerError::config(
                "MIN_BATCH_SIZE must be greater than zero",
                None,
            ));
        }
        Ok(())
    }

    /// Override the start block.
    #[must_use]
    pub const fn with_start_block(mut self, start_block: u64) -> Self {
        self.start_block = start_block;
        self
    }

    /// Override the end block.
    #[must_use]
    pub const fn with_end_block(mut self, end_block: u64) -> Self {
        self.end_block = Some(end_block);
        self
    }

    /// Override the initial batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the backoff floor.
    #[must_use]
    pub const fn with_min_batch_size(mut self, min_batch_size: u64) -> Self {
        self.min_batch_size = min_batch_size;
        self
    }

    /// Override the contract address.
    #[must_use]
    pub const fn with_contract_address(mut self, contract_address: Address) -> Self {
        self.contract_address = contract_address;
        self
    }

    /// Get the Ethereum RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the contract address.
    #[must_use]
    pub const fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Get the start block.
    #[must_use]
    pub const fn start_block(&self) -> u64 {
        self.start_block
    }

    /// Get the explicit end block, if any.
    #[must_use]
    pub const fn end_block(&self) -> Option<u64> {
        self.end_block
    }

    /// Get the initial batch size.
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Get the minimum batch size.
    #[must_use]
    pub const fn min_batch_size(&self) -> u64 {
        self.min_batch_size
    }

    /// Build the scanner's backoff policy from this configuration.
    #[must_use]
    pub const fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            min_batch_size: self.min_batch_size,
            max_retries_at_floor: self.max_retries_at_floor,
            retry_delay: self.retry_delay,
        }
    }
}

fn resolve_rpc_url<F>(lookup: &F) -> TrackerResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("RPC_URL").filter(|url| !url.trim().is_empty()) {
        return Ok(url.trim().to_string());
    }

    let api_key = lookup("ALCHEMY_API_KEY").ok_or_else(|| {
        TrackerError::config("RPC_URL or ALCHEMY_API_KEY environment variable is required", None)
    })?;

    if api_key.is_empty() || api_key == API_KEY_PLACEHOLDER {
        return Err(TrackerError::config(
            "ALCHEMY_API_KEY must be set to a valid Alchemy API key",
            None,
        ));
    }

    Ok(format!("https://eth-mainnet.g.alchemy.com/v2/{api_key}"))
}

fn parse_var<F, T>(lookup: &F, key: &str) -> TrackerResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                TrackerError::config(
                    format!("{key} must be a valid number, got: {raw}"),
                    Some(Box::new(e)),
                )
            })
        })
        .transpose()
}
