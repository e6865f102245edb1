//! Integration tests for the batch scanner's adaptive backoff.
//!
//! A scripted fetcher stands in for the RPC provider so that every failure
//! pattern is reproducible without network access.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::unreadable_literal)]

mod common;

use common::{fast_policy, rebase_log, truncated_rebase_log, StubFetcher, ONE};
use usdn_rebase_tracker::error::TrackerError;
use usdn_rebase_tracker::scanner::BatchScanner;

/// A rejected first batch halves the batch size and the scan continues at the
/// smaller size until the end, never growing back.
#[tokio::test]
async fn test_failed_batch_halves_and_never_regrows() {
    let scanner = BatchScanner::new(StubFetcher::new(Vec::new()).fail_query(0), fast_policy(100, None));

    let results = scanner.scan(1000, 2999, 1000).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(
        scanner.fetcher().queries(),
        vec![
            (1000, 1999),
            (1000, 1499),
            (1500, 1999),
            (2000, 2499),
            (2500, 2999),
        ]
    );
}

#[tokio::test]
async fn test_batch_size_never_below_floor() {
    let scanner = BatchScanner::new(
        StubFetcher::new(Vec::new()).fail_first_queries(10),
        fast_policy(100, None),
    );

    scanner.scan(0, 999, 800).await.unwrap();

    let queries = scanner.fetcher().queries();
    assert!(queries.iter().all(|(from, to)| to - from + 1 >= 100));

    // 800 -> 400 -> 200 -> 100, then seven more failures at the floor
    assert_eq!(queries[0], (0, 799));
    assert_eq!(queries[3], (0, 99));
    assert_eq!(queries[9], (0, 99));
    assert_eq!(queries[10], (0, 99));
    assert_eq!(queries.last(), Some(&(900, 999)));
}

#[tokio::test]
async fn test_initial_batch_below_floor_is_raised() {
    let scanner = BatchScanner::new(StubFetcher::new(Vec::new()), fast_policy(500, None));

    scanner.scan(0, 999, 10).await.unwrap();

    assert_eq!(scanner.fetcher().queries(), vec![(0, 499), (500, 999)]);
}

#[tokio::test]
async fn test_start_past_end_returns_empty_without_queries() {
    let scanner = BatchScanner::new(StubFetcher::new(Vec::new()), fast_policy(100, None));

    let results = scanner.scan(3000, 2999, 1000).await.unwrap();

    assert!(results.is_empty());
    assert!(scanner.fetcher().queries().is_empty());
}

#[tokio::test]
async fn test_single_block_range() {
    let fetcher = StubFetcher::new(vec![rebase_log(42, ONE, ONE - 1)]);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let results = scanner.scan(42, 42, 1_000_000).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(scanner.fetcher().queries(), vec![(42, 42)]);
}

#[tokio::test]
async fn test_events_in_block_order_across_batches() {
    let logs = vec![
        rebase_log(1000, ONE, ONE - 10),
        rebase_log(1999, ONE - 10, ONE - 20),
        rebase_log(2000, ONE - 20, ONE - 30),
        rebase_log(2999, ONE - 30, ONE - 40),
    ];
    let scanner = BatchScanner::new(StubFetcher::new(logs), fast_policy(100, None));

    let results = scanner.scan(1000, 2999, 1000).await.unwrap();

    let blocks: Vec<u64> = results.iter().map(|r| r.event.block_number).collect();
    assert_eq!(blocks, vec![1000, 1999, 2000, 2999]);
}

/// Events fetched by a batch that later fails must not appear twice once the
/// range is retried.
#[tokio::test]
async fn test_timestamp_failure_retries_without_duplicates() {
    let logs = vec![rebase_log(1500, ONE, ONE - 10), rebase_log(2500, ONE - 10, ONE - 20)];
    let fetcher = StubFetcher::new(logs).fail_timestamp(1);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let results = scanner.scan(1000, 2999, 2000).await.unwrap();

    let blocks: Vec<u64> = results.iter().map(|r| r.event.block_number).collect();
    assert_eq!(blocks, vec![1500, 2500]);
    assert_eq!(
        scanner.fetcher().queries(),
        vec![(1000, 2999), (1000, 1999), (2000, 2999)]
    );
}

#[tokio::test]
async fn test_timestamps_cached_per_block() {
    let logs = vec![
        rebase_log(1500, ONE, ONE - 10),
        rebase_log(1500, ONE - 10, ONE - 20),
        rebase_log(1600, ONE - 20, ONE - 30),
    ];
    let fetcher = StubFetcher::new(logs).with_timestamp(1500, 1_734_527_100);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let results = scanner.scan(1000, 1999, 1000).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].timestamp, 1_734_527_100);
    assert_eq!(results[1].timestamp, 1_734_527_100);
    assert_eq!(scanner.fetcher().timestamp_calls(), vec![1500, 1600]);
}

#[tokio::test]
async fn test_decode_failure_aborts_scan() {
    let fetcher = StubFetcher::new(vec![truncated_rebase_log(1500)]);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let result = scanner.scan(1000, 2999, 1000).await;

    assert!(matches!(result, Err(TrackerError::DecodingError { .. })));
    assert_eq!(scanner.fetcher().queries(), vec![(1000, 1999)]);
}

#[tokio::test]
async fn test_retry_cap_exhausted_at_floor() {
    let fetcher = StubFetcher::new(Vec::new()).fail_all_queries();
    let scanner = BatchScanner::new(fetcher, fast_policy(100, Some(2)));

    let result = scanner.scan(0, 999, 400).await;

    assert!(matches!(result, Err(TrackerError::RpcError { .. })));
    // 400 -> 200 -> 100, then three failures at the floor
    assert_eq!(
        scanner.fetcher().queries(),
        vec![(0, 399), (0, 199), (0, 99), (0, 99), (0, 99)]
    );
}

#[tokio::test]
async fn test_floor_failures_reset_after_success() {
    // Failures: 0 (at floor), 1 (at floor), success, 3 (at floor), 4 (at floor), success
    let fetcher = StubFetcher::new(Vec::new())
        .fail_query(0)
        .fail_query(1)
        .fail_query(3)
        .fail_query(4);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, Some(2)));

    let result = scanner.scan(0, 199, 100).await;

    assert!(result.is_ok());
    assert_eq!(scanner.fetcher().queries().len(), 6);
}

#[tokio::test]
async fn test_scan_reaches_u64_max_without_overflow() {
    let scanner = BatchScanner::new(StubFetcher::new(Vec::new()), fast_policy(1, None));

    let results = scanner.scan(u64::MAX - 1, u64::MAX, 1000).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(scanner.fetcher().queries(), vec![(u64::MAX - 1, u64::MAX)]);
}

/// Events of batches that drained before a fatal decode error have already
/// been handed out.
#[tokio::test]
async fn test_events_delivered_before_decode_failure() {
    let fetcher = StubFetcher::new(vec![
        rebase_log(1500, ONE, ONE - 10),
        truncated_rebase_log(2500),
    ]);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let mut delivered = Vec::new();
    let result = scanner
        .scan_each(1000, 2999, 1000, |scanned| {
            delivered.push(scanned.event.block_number);
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(TrackerError::DecodingError { .. })));
    assert_eq!(delivered, vec![1500]);
}

#[tokio::test]
async fn test_retried_batch_delivers_each_event_once() {
    let logs = vec![rebase_log(1500, ONE, ONE - 10), rebase_log(2500, ONE - 10, ONE - 20)];
    let fetcher = StubFetcher::new(logs).fail_timestamp(1);
    let scanner = BatchScanner::new(fetcher, fast_policy(100, None));

    let mut delivered = Vec::new();
    let results = scanner
        .scan_each(1000, 2999, 2000, |scanned| {
            delivered.push(scanned.event.block_number);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(delivered, vec![1500, 2500]);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_callback_error_aborts_scan() {
    let logs = vec![rebase_log(1500, ONE, ONE - 10), rebase_log(2500, ONE - 10, ONE - 20)];
    let scanner = BatchScanner::new(StubFetcher::new(logs), fast_policy(100, None));

    let result = scanner
        .scan_each(1000, 2999, 1000, |_| {
            Err(TrackerError::math("timestamp out of range", None))
        })
        .await;

    assert!(matches!(result, Err(TrackerError::MathError { .. })));
    assert_eq!(scanner.fetcher().queries(), vec![(1000, 1999)]);
}
