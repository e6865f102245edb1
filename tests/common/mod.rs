//! Scripted [`RangeFetcher`] used by the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use alloy::primitives::{Bytes, Log as PrimitiveLog, LogData, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use usdn_rebase_tracker::config::USDN_CONTRACT_ADDRESS;
use usdn_rebase_tracker::error::{TrackerError, TrackerResult};
use usdn_rebase_tracker::events::Rebase;
use usdn_rebase_tracker::rpc::RangeFetcher;
use usdn_rebase_tracker::scanner::BackoffPolicy;

/// One whole token in base units.
pub const ONE: u128 = 1_000_000_000_000_000_000;

/// Serves a fixed set of logs, failing the calls it was told to fail.
#[derive(Default)]
pub struct StubFetcher {
    logs: Vec<Log>,
    timestamps: HashMap<u64, u64>,
    failing_queries: HashSet<usize>,
    failing_timestamps: HashSet<usize>,
    fail_all_queries: bool,
    queries: Mutex<Vec<(u64, u64)>>,
    timestamp_calls: Mutex<Vec<u64>>,
}

impl StubFetcher {
    pub fn new(logs: Vec<Log>) -> Self {
        Self {
            logs,
            ..Self::default()
        }
    }

    /// Fail the `n`th range query (zero-based).
    pub fn fail_query(mut self, n: usize) -> Self {
        self.failing_queries.insert(n);
        self
    }

    /// Fail the first `n` range queries.
    pub fn fail_first_queries(mut self, n: usize) -> Self {
        self.failing_queries.extend(0..n);
        self
    }

    /// Fail every range query.
    pub fn fail_all_queries(mut self) -> Self {
        self.fail_all_queries = true;
        self
    }

    /// Fail the `n`th timestamp lookup (zero-based).
    pub fn fail_timestamp(mut self, n: usize) -> Self {
        self.failing_timestamps.insert(n);
        self
    }

    pub fn with_timestamp(mut self, block_number: u64, timestamp: u64) -> Self {
        self.timestamps.insert(block_number, timestamp);
        self
    }

    /// Every range queried so far, in call order.
    pub fn queries(&self) -> Vec<(u64, u64)> {
        self.queries.lock().unwrap().clone()
    }

    /// Every block whose timestamp was requested, in call order.
    pub fn timestamp_calls(&self) -> Vec<u64> {
        self.timestamp_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeFetcher for StubFetcher {
    async fn query_range(&self, from_block: u64, to_block: u64) -> TrackerResult<Vec<Log>> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push((from_block, to_block));
            queries.len() - 1
        };

        if self.fail_all_queries || self.failing_queries.contains(&call) {
            return Err(TrackerError::rpc(
                "query returned more than 10000 results",
                None,
            ));
        }

        Ok(self
            .logs
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|b| b >= from_block && b <= to_block)
            })
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block_number: u64) -> TrackerResult<u64> {
        let call = {
            let mut calls = self.timestamp_calls.lock().unwrap();
            calls.push(block_number);
            calls.len() - 1
        };

        if self.failing_timestamps.contains(&call) {
            return Err(TrackerError::rpc("header not found", None));
        }

        Ok(self
            .timestamps
            .get(&block_number)
            .copied()
            .unwrap_or(1_700_000_000 + block_number * 12))
    }
}

/// Backoff policy with no retry delay.
pub fn fast_policy(min_batch_size: u64, max_retries_at_floor: Option<u32>) -> BackoffPolicy {
    BackoffPolicy {
        min_batch_size,
        max_retries_at_floor,
        retry_delay: Duration::ZERO,
    }
}

/// A well-formed `Rebase` log at `block_number`.
pub fn rebase_log(block_number: u64, old_divisor: u128, new_divisor: u128) -> Log {
    let event = Rebase {
        oldDivisor: U256::from(old_divisor),
        newDivisor: U256::from(new_divisor),
    };

    Log {
        inner: PrimitiveLog {
            address: USDN_CONTRACT_ADDRESS,
            data: event.encode_log_data(),
        },
        block_number: Some(block_number),
        transaction_hash: Some(B256::with_last_byte(u8::try_from(block_number % 256).unwrap())),
        ..Default::default()
    }
}

/// A `Rebase` log whose data is cut short, so decoding fails.
pub fn truncated_rebase_log(block_number: u64) -> Log {
    let mut log = rebase_log(block_number, ONE, ONE);
    let topics = log.inner.data.topics().to_vec();
    let data = Bytes::copy_from_slice(&log.inner.data.data[..32]);
    log.inner.data = LogData::new_unchecked(topics, data);
    log
}
