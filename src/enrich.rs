//! Human-readable enrichment of decoded rebases.
//!
//! Each [`RebaseEvent`] is paired with its block timestamp and turned into an
//! [`EnrichedRebase`] carrying a formatted date, the token value implied by
//! the old and new divisor, and the resulting percentage increase.
//!
//! # Token Value
//!
//! One whole token is `10^18` base units. Its displayed value under a divisor is
//! computed in integer arithmetic with four extra digits of precision:
//!
//! ```text
//! value = floor(10^18 * 10^4 / divisor) / 10^4
//! ```
//!
//! # Example
//!
//! ```
//! use alloy::primitives::U256;
//! use usdn_rebase_tracker::enrich::{percent_increase, token_value};
//!
//! let old_value = token_value(U256::from(1_000_000_000_000_000_000_u128));
//! let new_value = token_value(U256::from(990_000_000_000_000_000_u128));
//! assert_eq!(old_value, "1.0000");
//! assert_eq!(new_value, "1.0101");
//! assert_eq!(percent_increase(&old_value, &new_value), "1.01");
//! ```

use crate::error::{TrackerError, TrackerResult};
use crate::events::RebaseEvent;
use alloy::primitives::U256;
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use tracing::warn;

/// `10^18` base units scaled by `10^4` for display precision.
const SCALED_UNIT: u128 = 10_u128.pow(22);

/// Display precision of token values (four fractional digits).
const VALUE_PRECISION: u64 = 10_000;

/// Date format used in all output: `DD/MM/YY HH:MM`.
pub const DATE_FORMAT: &str = "%d/%m/%y %H:%M";

/// A rebase with its timestamp and derived display values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRebase {
    /// The decoded event
    #[serde(flatten)]
    pub event: RebaseEvent,
    /// Unix timestamp (seconds) of the event's block
    pub timestamp: u64,
    /// `DD/MM/YY HH:MM` rendering of `timestamp`
    pub formatted_date: String,
    /// Token value under the old divisor, 4 fractional digits
    pub old_value: String,
    /// Token value under the new divisor, 4 fractional digits
    pub new_value: String,
    /// `(new / old - 1) * 100`, 2 fractional digits
    pub percent_increase: String,
}

/// Enrich `event` using the local time zone for the formatted date.
///
/// # Errors
///
/// Returns a math error if `timestamp` is outside the representable calendar range.
pub fn enrich(event: &RebaseEvent, timestamp: u64) -> TrackerResult<EnrichedRebase> {
    enrich_in(event, timestamp, &Local)
}

/// Enrich `event`, formatting its date in `tz`.
///
/// # Errors
///
/// Returns a math error if `timestamp` is outside the representable calendar range.
pub fn enrich_in<Tz>(event: &RebaseEvent, timestamp: u64, tz: &Tz) -> TrackerResult<EnrichedRebase>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let old_value = token_value(event.old_divisor);
    let new_value = token_value(event.new_divisor);
    let percent_increase = percent_increase(&old_value, &new_value);

    Ok(EnrichedRebase {
        event: event.clone(),
        timestamp,
        formatted_date: format_date_in(timestamp, tz)?,
        old_value,
        new_value,
        percent_increase,
    })
}

/// Format a unix timestamp as `DD/MM/YY HH:MM` in the local time zone.
///
/// # Errors
///
/// Returns a math error if `timestamp` is outside the representable calendar range.
pub fn format_date(timestamp: u64) -> TrackerResult<String> {
    format_date_in(timestamp, &Local)
}

/// Format a unix timestamp as `DD/MM/YY HH:MM` in `tz`.
///
/// # Errors
///
/// Returns a math error if `timestamp` is outside the representable calendar range.
pub fn format_date_in<Tz>(timestamp: u64, tz: &Tz) -> TrackerResult<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let seconds = i64::try_from(timestamp).map_err(|e| {
        TrackerError::math(format!("Timestamp {timestamp} out of range"), Some(Box::new(e)))
    })?;

    let utc = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| TrackerError::math(format!("Timestamp {timestamp} out of range"), None))?;

    Ok(utc.with_timezone(tz).format(DATE_FORMAT).to_string())
}

/// Token value of one whole token under `divisor`, with 4 fractional digits.
///
/// A zero divisor has no meaningful value; it yields `"0.0000"` so that
/// [`percent_increase`] surfaces the gap as `NaN` instead of failing.
#[must_use]
pub fn token_value(divisor: U256) -> String {
    if divisor.is_zero() {
        warn!("Zero divisor has no token value");
        return "0.0000".to_string();
    }

    let scaled = U256::from(SCALED_UNIT) / divisor;
    let (whole, fraction) = scaled.div_rem(U256::from(VALUE_PRECISION));
    let fraction = u64::try_from(fraction).unwrap_or(0);

    format!("{whole}.{fraction:04}")
}

/// Percentage increase from `old_value` to `new_value`, with 2 fractional digits.
///
/// Returns `"NaN"` when `old_value` is zero or either input does not parse.
#[must_use]
pub fn percent_increase(old_value: &str, new_value: &str) -> String {
    let increase = match (old_value.parse::<f64>(), new_value.parse::<f64>()) {
        (Ok(old), Ok(new)) if old != 0.0 => (new / old - 1.0) * 100.0,
        _ => f64::NAN,
    };

    format!("{increase:.2}")
}
