//! Structured logging setup.
//!
//! Logging uses the tracing framework. Console output is pretty-printed by
//! default or JSON for log aggregation, and an optional JSON log file rotates
//! daily.
//!
//! # Environment Configuration
//!
//! ```bash
//! # Set log level for all modules
//! RUST_LOG=debug cargo run -- scan
//!
//! # Watch the backoff without alloy noise
//! RUST_LOG=usdn_rebase_tracker::scanner=debug,warn cargo run -- scan
//!
//! # JSON console output plus a rotating file
//! LOG_JSON=true LOG_FILE=./logs/tracker.log cargo run -- scan
//! ```
//!
//! Logs go to stderr so that stdout carries only the scan report.

use eyre::{Result, WrapErr};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter applied when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "usdn_rebase_tracker=info,warn";

/// Initialize the tracing subscriber.
///
/// # Arguments
///
/// * `log_level` - Optional filter override; `RUST_LOG` takes precedence.
/// * `log_file` - Optional file path for JSON output with daily rotation.
/// * `json_output` - JSON console output instead of pretty-printed.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for the lifetime of the program.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(DEFAULT_FILTER)
    };

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(ref path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create log directory {}", parent.display())
            })?;
        }

        let file_appender = tracing_appender::rolling::daily(
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name().unwrap_or_else(|| OsStr::new("tracker.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // File always uses JSON for structured log analysis
        let layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed();

        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("Failed to install the global tracing subscriber")?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized successfully"
    );

    Ok(guard)
}
