//! # USDN Rebase Tracker
//!
//! Scanner and analyzer for `Rebase` events emitted by the USDN token, built on
//! [Alloy](https://github.com/alloy-rs/alloy).
//!
//! Each rebase lowers the token divisor, which raises the value of one whole
//! token. This crate walks the contract's history in large block batches,
//! shrinking the batch whenever the provider rejects a query, and turns the
//! decoded events into a readable growth report.
//!
//! ## Features
//!
//! - **Type-safe event decoding** using Alloy's `sol!` macro
//! - **Adaptive batch backoff** that never skips or duplicates a block
//! - **Exact token values** computed in 256-bit integer arithmetic
//! - **Series analysis**: growth, endpoints and average rebase cadence
//! - **Structured logging** with tracing
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **RPC Layer** ([`rpc`]) - Provider management and the [`rpc::RangeFetcher`] seam
//! 3. **Events Layer** ([`events`]) - `Rebase` filter and decoding
//! 4. **Scanner Layer** ([`scanner`]) - Batched scan with adaptive backoff
//! 5. **Enrich Layer** ([`enrich`]) - Dates, token values and increases
//! 6. **Analysis Layer** ([`analysis`]) - Series summary
//!
//! ## Quick Start
//!
//! ```bash
//! # Full scan from the deployment block to the chain head
//! cargo run --release -- scan
//!
//! # Current chain head
//! cargo run --release -- head
//! ```
//!
//! ### Using as a Library
//!
//! ```rust,no_run
//! use usdn_rebase_tracker::{
//!     analysis::analyze, config::Config, enrich::enrich, rpc::*, scanner::BatchScanner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let provider = create_provider(config.rpc_url()).await?;
//!     let head = get_latest_block(&provider).await?;
//!
//!     let scanner = BatchScanner::new(
//!         RpcRangeFetcher::new(provider, config.contract_address()),
//!         config.backoff_policy(),
//!     );
//!     let scanned = scanner.scan(config.start_block(), head, config.batch_size()).await?;
//!
//!     let enriched = scanned
//!         .iter()
//!         .map(|s| enrich(&s.event, s.timestamp))
//!         .collect::<Result<Vec<_>, _>>()?;
//!     println!("{} rebases", analyze(&enriched).event_count);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Setup
//!
//! Create a `.env` file with an RPC endpoint or an Alchemy API key:
//!
//! ```text
//! ALCHEMY_API_KEY=your_key_here
//! ```
//!
//! ## Testing
//!
//! ```bash
//! # All tests (live RPC tests are ignored by default)
//! cargo test
//!
//! # Live tests against a mainnet endpoint
//! RPC_URL=... cargo test -- --ignored
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod events;
pub mod observability;
pub mod rpc;
pub mod scanner;
