//! Command-line interface for the USDN rebase tracker.
//!
//! This module scans the USDN token contract for `Rebase` events and reports
//! how the token value evolved across the series.
//!
//! # Commands
//!
//! - `scan`: Scan for rebases, print each one and a growth summary
//! - `head`: Print the current chain head
//!
//! # Example
//!
//! ```bash
//! # Scan from the default deployment block to the chain head
//! usdn-rebase-tracker scan
//!
//! # Scan a window with a smaller backoff floor and JSON output
//! usdn-rebase-tracker scan --from-block 21500000 --to-block 21600000 --min-batch-size 100 --json
//! ```

use crate::analysis::{analyze, AnalysisSummary};
use crate::config::Config;
use crate::enrich::{enrich, EnrichedRebase};
use crate::error::{TrackerError, TrackerResult};
use crate::rpc::{check_connection, create_provider, get_latest_block, RpcRangeFetcher};
use crate::scanner::BatchScanner;
use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fmt::Write as _;
use tracing::info;

/// USDN Rebase Tracker
#[derive(Parser, Debug)]
#[command(name = "usdn-rebase-tracker")]
#[command(about = "Scan USDN Rebase events and analyze token value growth", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan for Rebase events and print a growth summary
    Scan(ScanArgs),

    /// Print the current chain head
    Head,
}

/// Overrides for a single scan. Unset flags fall back to the environment.
#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// First block to scan (default: START_BLOCK or the deployment block)
    #[arg(long)]
    from_block: Option<u64>,

    /// Last block to scan (default: END_BLOCK or the chain head)
    #[arg(long)]
    to_block: Option<u64>,

    /// Initial blocks per query (default: BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<u64>,

    /// Smallest batch size the backoff may reach (default: MIN_BATCH_SIZE)
    #[arg(long)]
    min_batch_size: Option<u64>,

    /// USDN contract address (default: USDN_CONTRACT_ADDRESS)
    #[arg(long)]
    contract: Option<Address>,

    /// Print the analysis summary as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - RPC connection fails
/// - A rebase log cannot be decoded
/// - The retry cap is configured and exceeded
pub async fn run() -> TrackerResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan(args) => run_scan_command(args).await,
        Commands::Head => run_head_command().await,
    }
}

/// Execute the scan command: scan, enrich, analyze, report.
async fn run_scan_command(args: ScanArgs) -> TrackerResult<()> {
    info!("Starting USDN rebase scan");

    let config = apply_overrides(Config::from_env()?, &args)?;
    let provider = create_provider(config.rpc_url()).await?;

    let current_block = get_latest_block(&provider).await?;
    let end_block = config.end_block().unwrap_or(current_block);

    if !args.json {
        println!("Current block: {}", current_block.to_string().cyan());
        println!("Starting from block: {}", config.start_block().to_string().cyan());
        println!("{}", "Fetching rebase events...".dimmed());
    }

    let scanner = BatchScanner::new(
        RpcRangeFetcher::new(provider, config.contract_address()),
        config.backoff_policy(),
    );
    let json = args.json;
    let mut enriched: Vec<EnrichedRebase> = Vec::new();
    scanner
        .scan_each(config.start_block(), end_block, config.batch_size(), |scanned| {
            let rebase = enrich(&scanned.event, scanned.timestamp)?;
            if !json {
                println!("{}", format_rebase_line(&rebase));
            }
            enriched.push(rebase);
            Ok(())
        })
        .await?;

    let summary = analyze(&enriched);
    info!(events = summary.event_count, "Scan complete");

    if args.json {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| {
            TrackerError::output("Failed to serialize analysis summary", Some(Box::new(e)))
        })?;
        println!("{json}");
        return Ok(());
    }

    print!("{}", format_summary(&summary));

    Ok(())
}

/// Execute the head command.
async fn run_head_command() -> TrackerResult<()> {
    let config = Config::from_env()?;
    let provider = create_provider(config.rpc_url()).await?;

    check_connection(&provider).await?;
    let head = get_latest_block(&provider).await?;

    println!("Current block: {}", head.to_string().cyan());
    Ok(())
}

/// Layer CLI flags over the environment configuration and validate the result.
fn apply_overrides(mut config: Config, args: &ScanArgs) -> TrackerResult<Config> {
    if let Some(from_block) = args.from_block {
        config = config.with_start_block(from_block);
    }
    if let Some(to_block) = args.to_block {
        config = config.with_end_block(to_block);
    }
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(min_batch_size) = args.min_batch_size {
        config = config.with_min_batch_size(min_batch_size);
    }
    if let Some(contract) = args.contract {
        config = config.with_contract_address(contract);
    }

    config.validate()?;
    Ok(config)
}

/// `{block} - {date} - Rebased: {old} -> {new} (+{pct}%)`
fn format_rebase_line(rebase: &EnrichedRebase) -> String {
    format!(
        "{} - {} - Rebased: {} -> {} ({}%)",
        rebase.event.block_number.to_string().yellow(),
        rebase.formatted_date,
        rebase.old_value,
        rebase.new_value.green(),
        format!("+{}", rebase.percent_increase).green()
    )
}

/// Total count followed by the summary block, if there is anything to summarize.
fn format_summary(summary: &AnalysisSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nTotal rebase events found: {}", summary.event_count);

    let (Some(first), Some(last)) = (&summary.first, &summary.last) else {
        return out;
    };

    let _ = writeln!(out, "\n{}", "=== Rebase Summary ===".bold());
    let _ = writeln!(
        out,
        "First rebase: {} (Block {})",
        first.formatted_date, first.block_number
    );
    let _ = writeln!(
        out,
        "Latest rebase: {} (Block {})",
        last.formatted_date, last.block_number
    );
    if let (Some(initial), Some(current)) = (&summary.initial_value, &summary.current_value) {
        let _ = writeln!(out, "Initial token value: {initial}");
        let _ = writeln!(out, "Current token value: {current}");
    }
    if let Some(growth) = &summary.total_value_growth {
        let _ = writeln!(out, "Total token growth from rebases: {}%", growth.green());
    }
    if let Some(cadence) = &summary.average_interval {
        let _ = writeln!(out, "Average time between rebases: {cadence}");
    }

    out
}
