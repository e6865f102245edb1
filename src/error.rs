//! Error types for the rebase tracker.
//!
//! This module provides a unified error type [`TrackerError`] covering every
//! failure that can escape the scan pipeline.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`TrackerError::ConfigError`]: Configuration and environment issues
//! - [`TrackerError::RpcError`]: RPC provider and network errors
//! - [`TrackerError::DecodingError`]: Rebase log decoding errors
//! - [`TrackerError::MathError`]: Arithmetic and calendar range errors
//! - [`TrackerError::OutputError`]: Report serialization errors
//!
//! Transient RPC failures are absorbed by the batch scanner and only surface
//! here when a retry cap is configured and exceeded. Decoding errors always
//! abort the scan.
//!
//! # Example
//!
//! ```
//! use usdn_rebase_tracker::error::{TrackerError, TrackerResult};
//!
//! fn validate_batch_size(batch_size: u64) -> TrackerResult<()> {
//!     if batch_size == 0 {
//!         return Err(TrackerError::config("batch size cannot be zero", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`TrackerError`].
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Boxed source error carried by every [`TrackerError`] variant.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the rebase tracker.
#[derive(Debug)]
pub enum TrackerError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Missing RPC endpoint
    /// - Invalid contract address
    /// - Malformed or out-of-range numeric values
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// RPC provider or network errors.
    ///
    /// Variants include:
    /// - Failed to parse or reach the endpoint
    /// - `eth_getLogs` range rejected or rate limited
    /// - Block not found
    /// - Retry cap exceeded at the minimum batch size
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Rebase log decoding errors.
    ///
    /// Variants include:
    /// - Signature or data shape mismatch
    /// - Missing block number or transaction hash
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Arithmetic or calculation errors.
    ///
    /// Variants include:
    /// - Timestamp outside the representable calendar range
    /// - Overflow
    MathError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Report rendering or serialization errors.
    OutputError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl TrackerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::error::TrackerError;
    ///
    /// let err = TrackerError::config("RPC_URL not set", None);
    /// assert!(matches!(err, TrackerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::error::TrackerError;
    ///
    /// let err = TrackerError::rpc("query returned more than 10000 results", None);
    /// assert!(matches!(err, TrackerError::RpcError { .. }));
    /// ```
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::error::TrackerError;
    ///
    /// let err = TrackerError::decoding("Log missing transaction hash", None);
    /// assert!(matches!(err, TrackerError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new math error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::error::TrackerError;
    ///
    /// let err = TrackerError::math("timestamp out of range", None);
    /// assert!(matches!(err, TrackerError::MathError { .. }));
    /// ```
    #[must_use]
    pub fn math(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::MathError {
            message: message.into(),
            source,
        }
    }

    /// Create a new output error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdn_rebase_tracker::error::TrackerError;
    ///
    /// let err = TrackerError::output("Failed to serialize summary", None);
    /// assert!(matches!(err, TrackerError::OutputError { .. }));
    /// ```
    #[must_use]
    pub fn output(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::OutputError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::MathError { message, .. } => write!(f, "Math error: {message}"),
            Self::OutputError { message, .. } => write!(f, "Output error: {message}"),
        }
    }
}

impl std::error::Error for TrackerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::MathError { source, .. }
            | Self::OutputError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
        }
    }
}
