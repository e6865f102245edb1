//! CLI entry point for the USDN rebase tracker.
//!
//! # Architecture Flow
//!
//! ```text
//! main.rs (Runtime Initialization)
//!     ↓
//! CLI Layer (src/cli.rs)
//!     ↓
//! 1. Config Layer (src/config.rs)      → Load environment variables
//! 2. RPC Layer (src/rpc.rs)            → Create provider, range fetcher
//! 3. Scanner Layer (src/scanner.rs)    → Batched log scan with backoff
//! 4. Events Layer (src/events.rs)      → Decode Rebase logs
//! 5. Enrich Layer (src/enrich.rs)      → Dates and token values
//! 6. Analysis Layer (src/analysis.rs)  → Series summary
//! 7. CLI Layer (output)                → Text or JSON report
//! ```
//!
//! All errors bubble up via `TrackerResult<T>` and exit the process with
//! status 1.

use tracing::error;
use usdn_rebase_tracker::{cli, observability};

#[tokio::main]
async fn main() {
    // - RUST_LOG: filter directives (e.g. "debug", "usdn_rebase_tracker::scanner=debug")
    // - LOG_JSON: JSON console output ("true" or "false")
    // - LOG_FILE: JSON log file with daily rotation
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Flushes the file writer on drop
    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
