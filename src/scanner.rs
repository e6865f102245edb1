//! Resilient paginated scanning of `Rebase` logs.
//!
//! [`BatchScanner`] walks a closed block range in batches, asking a
//! [`RangeFetcher`] for each batch. When a range query fails (oversized range,
//! rate limit, transient network fault) the batch size is halved down to a
//! floor and the same range start is retried. Batch size never grows back.
//!
//! The retry bookkeeping lives in [`ScanState`], which can be driven without
//! any network at all:
//!
//! ```
//! use usdn_rebase_tracker::scanner::{Backoff, BackoffPolicy, ScanState};
//!
//! let policy = BackoffPolicy::default();
//! let mut state = ScanState::new(0, 9_999, 4_000, &policy);
//!
//! let range = state.next_range().unwrap();
//! assert_eq!((range.from_block, range.to_block), (0, 3_999));
//!
//! // Range rejected: halve and retry from the same block
//! assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 2_000 });
//! let range = state.next_range().unwrap();
//! assert_eq!((range.from_block, range.to_block), (0, 1_999));
//!
//! state.record_success(range, Vec::new());
//! assert_eq!(state.from_block(), 2_000);
//! ```

use crate::error::{TrackerError, TrackerResult};
use crate::events::{decode_rebase_log, RebaseEvent};
use crate::rpc::RangeFetcher;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Smallest batch size the backoff will shrink to.
pub const DEFAULT_MIN_BATCH_SIZE: u64 = 1_000;

/// How the scanner reacts to failed range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Floor for the halving backoff
    pub min_batch_size: u64,
    /// Consecutive failures tolerated once the floor is reached; `None` retries forever
    pub max_retries_at_floor: Option<u32>,
    /// Base delay before retrying, jittered by ±25%
    pub retry_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            max_retries_at_floor: None,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    /// Effective floor, never below one block.
    #[must_use]
    pub fn floor(&self) -> u64 {
        self.min_batch_size.max(1)
    }

    /// Retry delay with ±25% jitter applied.
    #[must_use]
    pub fn jittered_delay(&self) -> Duration {
        if self.retry_delay.is_zero() {
            return Duration::ZERO;
        }

        let jitter_factor = 0.5 * (rand::random::<f64>() - 0.5);
        #[allow(clippy::cast_precision_loss)]
        let base_ms = self.retry_delay.as_millis() as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms = (base_ms * (1.0 + jitter_factor)).round().max(0.0) as u64;

        Duration::from_millis(delay_ms)
    }
}

/// A decoded rebase together with the timestamp of its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedRebase {
    /// The decoded event
    pub event: RebaseEvent,
    /// Unix timestamp (seconds) of the event's block
    pub timestamp: u64,
}

/// A closed block range `[from_block, to_block]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// First block (inclusive)
    pub from_block: u64,
    /// Last block (inclusive)
    pub to_block: u64,
}

/// Outcome of recording a failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry the same start block with this batch size.
    Retry {
        /// Batch size for the next attempt
        batch_size: u64,
    },
    /// The floor retry cap was exceeded.
    Exhausted {
        /// Consecutive failures observed at the floor
        failures_at_floor: u32,
    },
}

/// Cursor, batch size and accumulated results of one scan.
///
/// Invariants:
/// - `batch_size >= policy.floor()` at all times
/// - `from_block` never decreases
/// - results are appended in block order
#[derive(Debug, Clone)]
pub struct ScanState {
    from_block: u64,
    end_block: u64,
    batch_size: u64,
    failures_at_floor: u32,
    finished: bool,
    results: Vec<ScannedRebase>,
}

impl ScanState {
    /// Start a scan over `[start_block, end_block]`.
    ///
    /// An initial batch size below the policy floor is raised to the floor.
    /// A start past the end yields an already finished state.
    #[must_use]
    pub fn new(
        start_block: u64,
        end_block: u64,
        initial_batch_size: u64,
        policy: &BackoffPolicy,
    ) -> Self {
        Self {
            from_block: start_block,
            end_block,
            batch_size: initial_batch_size.max(policy.floor()),
            failures_at_floor: 0,
            finished: start_block > end_block,
            results: Vec::new(),
        }
    }

    /// Next range to query, or `None` when the scan is complete.
    #[must_use]
    pub fn next_range(&self) -> Option<BlockRange> {
        if self.finished {
            return None;
        }

        let to_block = self
            .from_block
            .saturating_add(self.batch_size.saturating_sub(1))
            .min(self.end_block);

        Some(BlockRange {
            from_block: self.from_block,
            to_block,
        })
    }

    /// Append a fully drained batch and advance past it.
    pub fn record_success(&mut self, range: BlockRange, events: Vec<ScannedRebase>) {
        self.results.extend(events);
        self.failures_at_floor = 0;

        match range.to_block.checked_add(1) {
            Some(next) => {
                self.from_block = next;
                self.finished = next > self.end_block;
            }
            None => self.finished = true,
        }
    }

    /// Halve the batch size (clamped to the floor) after a failed batch.
    ///
    /// The cursor is not moved, so the next range starts at the same block.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> Backoff {
        let floor = policy.floor();

        if self.batch_size <= floor {
            self.failures_at_floor = self.failures_at_floor.saturating_add(1);
        }
        self.batch_size = (self.batch_size / 2).max(floor);

        match policy.max_retries_at_floor {
            Some(max) if self.failures_at_floor > max => Backoff::Exhausted {
                failures_at_floor: self.failures_at_floor,
            },
            _ => Backoff::Retry {
                batch_size: self.batch_size,
            },
        }
    }

    /// Current cursor.
    #[must_use]
    pub const fn from_block(&self) -> u64 {
        self.from_block
    }

    /// Current batch size.
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Whether every block in the range has been scanned.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Events accumulated so far.
    #[must_use]
    pub fn results(&self) -> &[ScannedRebase] {
        &self.results
    }

    /// Consume the state, yielding the accumulated events.
    #[must_use]
    pub fn into_results(self) -> Vec<ScannedRebase> {
        self.results
    }
}

/// Drives a [`RangeFetcher`] across a block span with adaptive backoff.
#[derive(Debug)]
pub struct BatchScanner<F> {
    fetcher: F,
    policy: BackoffPolicy,
}

impl<F: RangeFetcher> BatchScanner<F> {
    /// Create a scanner over `fetcher` using `policy`.
    #[must_use]
    pub const fn new(fetcher: F, policy: BackoffPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// The wrapped fetcher.
    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The active backoff policy.
    #[must_use]
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Scan `[start_block, end_block]` and return every rebase in block order.
    ///
    /// Failed range queries and timestamp lookups shrink the batch size and
    /// retry; events staged by a failed attempt are discarded so a retried
    /// range never yields duplicates.
    ///
    /// # Errors
    ///
    /// - Decoding errors abort immediately.
    /// - An RPC error is returned only when `max_retries_at_floor` is set and
    ///   exceeded.
    pub async fn scan(
        &self,
        start_block: u64,
        end_block: u64,
        initial_batch_size: u64,
    ) -> TrackerResult<Vec<ScannedRebase>> {
        self.scan_each(start_block, end_block, initial_batch_size, |_| Ok(()))
            .await
    }

    /// Like [`BatchScanner::scan`], but hands each event to `on_event` as soon
    /// as its batch has fully drained.
    ///
    /// Events from a batch that later needs a retry are never passed on, so
    /// `on_event` sees every rebase exactly once and in block order. Events
    /// from earlier batches have already been delivered when a later batch
    /// aborts the scan.
    ///
    /// # Errors
    ///
    /// Same as [`BatchScanner::scan`]. An error returned by `on_event` also
    /// aborts the scan.
    #[instrument(skip(self, on_event), fields(min_batch_size = self.policy.min_batch_size))]
    pub async fn scan_each<C>(
        &self,
        start_block: u64,
        end_block: u64,
        initial_batch_size: u64,
        mut on_event: C,
    ) -> TrackerResult<Vec<ScannedRebase>>
    where
        C: FnMut(&ScannedRebase) -> TrackerResult<()>,
    {
        let mut state = ScanState::new(start_block, end_block, initial_batch_size, &self.policy);
        let mut timestamps: HashMap<u64, u64> = HashMap::new();

        if state.is_finished() {
            warn!(start_block, end_block, "Start block is past end block, nothing to scan");
        }

        while let Some(range) = state.next_range() {
            info!(
                from_block = range.from_block,
                to_block = range.to_block,
                batch_size = state.batch_size(),
                "Scanning blocks"
            );

            match self.fetch_batch(range, &mut timestamps).await {
                Ok(events) => {
                    if !events.is_empty() {
                        info!(
                            count = events.len(),
                            from_block = range.from_block,
                            to_block = range.to_block,
                            "Found Rebase events"
                        );
                    }
                    for event in &events {
                        on_event(event)?;
                    }
                    state.record_success(range, events);
                }
                Err(e @ TrackerError::DecodingError { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        from_block = range.from_block,
                        to_block = range.to_block,
                        error = %e,
                        "Error fetching logs"
                    );

                    match state.record_failure(&self.policy) {
                        Backoff::Retry { batch_size } => {
                            warn!(batch_size, "Reduced batch size");
                            let delay = self.policy.jittered_delay();
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                        }
                        Backoff::Exhausted { failures_at_floor } => {
                            return Err(TrackerError::rpc(
                                format!(
                                    "Giving up on blocks {} to {} after {failures_at_floor} failures at minimum batch size {}",
                                    range.from_block,
                                    range.to_block,
                                    self.policy.floor()
                                ),
                                Some(Box::new(e)),
                            ));
                        }
                    }
                }
            }
        }

        let results = state.into_results();
        info!(count = results.len(), "Scan complete");

        Ok(results)
    }

    /// Fetch, decode and timestamp every log in `range`.
    async fn fetch_batch(
        &self,
        range: BlockRange,
        timestamps: &mut HashMap<u64, u64>,
    ) -> TrackerResult<Vec<ScannedRebase>> {
        let logs = self
            .fetcher
            .query_range(range.from_block, range.to_block)
            .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            let event = decode_rebase_log(log)?;

            let timestamp = if let Some(cached) = timestamps.get(&event.block_number) {
                *cached
            } else {
                let fetched = self.fetcher.block_timestamp(event.block_number).await?;
                timestamps.insert(event.block_number, fetched);
                fetched
            };

            events.push(ScannedRebase { event, timestamp });
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min_batch_size: u64, max_retries_at_floor: Option<u32>) -> BackoffPolicy {
        BackoffPolicy {
            min_batch_size,
            max_retries_at_floor,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_empty_range_is_finished() {
        let state = ScanState::new(3000, 2999, 1000, &BackoffPolicy::default());
        assert!(state.is_finished());
        assert_eq!(state.next_range(), None);
    }

    #[test]
    fn test_last_range_clamped_to_end() {
        let state = ScanState::new(1000, 1499, 1000, &BackoffPolicy::default());
        assert_eq!(
            state.next_range(),
            Some(BlockRange {
                from_block: 1000,
                to_block: 1499
            })
        );
    }

    #[test]
    fn test_initial_batch_raised_to_floor() {
        let state = ScanState::new(0, 10_000, 10, &BackoffPolicy::default());
        assert_eq!(state.batch_size(), DEFAULT_MIN_BATCH_SIZE);
    }

    #[test]
    fn test_failure_halves_and_keeps_cursor() {
        let policy = policy(100, None);
        let mut state = ScanState::new(1000, 2999, 1000, &policy);

        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 500 });
        assert_eq!(state.from_block(), 1000);
        assert_eq!(state.next_range().map(|r| r.to_block), Some(1499));
    }

    #[test]
    fn test_batch_size_never_below_floor() {
        let policy = BackoffPolicy::default();
        let mut state = ScanState::new(0, u64::MAX, 1_000_000, &policy);

        for _ in 0..64 {
            state.record_failure(&policy);
            assert!(state.batch_size() >= DEFAULT_MIN_BATCH_SIZE);
        }
        assert_eq!(state.batch_size(), DEFAULT_MIN_BATCH_SIZE);
    }

    #[test]
    fn test_odd_batch_size_floor_division() {
        let policy = policy(1, None);
        let mut state = ScanState::new(0, 100, 7, &policy);
        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 3 });
    }

    #[test]
    fn test_success_does_not_grow_batch() {
        let policy = policy(100, None);
        let mut state = ScanState::new(0, 10_000, 1000, &policy);
        state.record_failure(&policy);

        let range = state.next_range();
        assert!(range.is_some());
        if let Some(range) = range {
            state.record_success(range, Vec::new());
        }
        assert_eq!(state.batch_size(), 500);
        assert_eq!(state.from_block(), 500);
    }

    #[test]
    fn test_retry_cap_at_floor() {
        let policy = policy(1000, Some(2));
        let mut state = ScanState::new(0, 100_000, 2000, &policy);

        // 2000 -> 1000 is not a floor failure
        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 1000 });
        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 1000 });
        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 1000 });
        assert_eq!(
            state.record_failure(&policy),
            Backoff::Exhausted {
                failures_at_floor: 3
            }
        );
    }

    #[test]
    fn test_success_resets_floor_failures() {
        let policy = policy(1000, Some(1));
        let mut state = ScanState::new(0, 100_000, 1000, &policy);

        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 1000 });
        if let Some(range) = state.next_range() {
            state.record_success(range, Vec::new());
        }
        assert_eq!(state.record_failure(&policy), Backoff::Retry { batch_size: 1000 });
    }

    #[test]
    fn test_range_ending_at_u64_max_terminates() {
        let policy = policy(1, None);
        let mut state = ScanState::new(u64::MAX - 1, u64::MAX, 10, &policy);

        let range = state.next_range();
        assert_eq!(
            range,
            Some(BlockRange {
                from_block: u64::MAX - 1,
                to_block: u64::MAX
            })
        );
        if let Some(range) = range {
            state.record_success(range, Vec::new());
        }
        assert!(state.is_finished());
    }

    #[test]
    fn test_jittered_delay_bounds() {
        let slow = BackoffPolicy {
            retry_delay: Duration::from_millis(1000),
            ..BackoffPolicy::default()
        };
        for _ in 0..100 {
            let delay = slow.jittered_delay();
            assert!(delay >= Duration::from_millis(750));
            assert!(delay <= Duration::from_millis(1250));
        }
        assert_eq!(policy(1, None).jittered_delay(), Duration::ZERO);
    }
}
