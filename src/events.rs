//! Rebase event decoding with compile-time type safety.
//!
//! The USDN token emits `Rebase(uint256 oldDivisor, uint256 newDivisor)` every
//! time its divisor is adjusted. A holder's displayed balance is their shares
//! divided by the current divisor, so a shrinking divisor grows every balance.
//!
//! This module uses Alloy's `sol!` macro to generate the event binding and
//! exposes [`decode_rebase_log`], a pure function from a raw RPC log to a
//! [`RebaseEvent`].
//!
//! ## Example
//!
//! ```no_run
//! use usdn_rebase_tracker::config::USDN_CONTRACT_ADDRESS;
//! use usdn_rebase_tracker::events::{create_rebase_filter, decode_rebase_log};
//! use usdn_rebase_tracker::rpc::create_provider;
//! use alloy::providers::Provider;
//!
//! # async fn example() {
//! # let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY").await.unwrap();
//! let filter = create_rebase_filter(USDN_CONTRACT_ADDRESS, 21_436_997, 21_500_000);
//! # let logs = provider.get_logs(&filter).await.unwrap();
//! # for log in logs {
//!     if let Ok(rebase) = decode_rebase_log(&log) {
//!         println!("{} -> {}", rebase.old_divisor, rebase.new_divisor);
//!     }
//! # }
//! # }
//! ```

use crate::error::{TrackerError, TrackerResult};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::Serialize;

sol! {
    interface IUsdn {
        /// Emitted when the token divisor is adjusted.
        event Rebase(uint256 oldDivisor, uint256 newDivisor);
    }
}

pub use IUsdn::Rebase;

/// A decoded rebase, keyed to the block and transaction that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseEvent {
    /// Hash of the emitting transaction
    pub transaction_hash: B256,
    /// Block the log was included in
    pub block_number: u64,
    /// Divisor before the rebase
    pub old_divisor: U256,
    /// Divisor after the rebase
    pub new_divisor: U256,
}

/// Create a filter for `Rebase` events from `contract` in `[from_block, to_block]`.
#[must_use]
pub fn create_rebase_filter(contract: Address, from_block: u64, to_block: u64) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(Rebase::SIGNATURE_HASH)
        .from_block(from_block)
        .to_block(to_block)
}

/// Decode a raw log into a [`RebaseEvent`].
///
/// # Errors
///
/// Returns a decoding error if the log has no block number or transaction
/// hash, or if its topics and data do not match `Rebase(uint256,uint256)`.
pub fn decode_rebase_log(log: &Log) -> TrackerResult<RebaseEvent> {
    let block_number = log
        .block_number
        .ok_or_else(|| TrackerError::decoding("Log missing block number", None))?;

    let transaction_hash = log.transaction_hash.ok_or_else(|| {
        TrackerError::decoding(
            format!("Log in block {block_number} missing transaction hash"),
            None,
        )
    })?;

    let decoded = Rebase::decode_log(&log.inner, true).map_err(|e| {
        TrackerError::decoding(
            format!("Failed to decode Rebase event in block {block_number}"),
            Some(Box::new(e)),
        )
    })?;

    Ok(RebaseEvent {
        transaction_hash,
        block_number,
        old_divisor: decoded.data.oldDivisor,
        new_divisor: decoded.data.newDivisor,
    })
}
