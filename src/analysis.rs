//! Sequential analysis of an ordered rebase series.
//!
//! [`analyze`] is a pure reduction over enriched rebases in block order. It
//! attaches a divisor-driven percentage change to every event and summarizes
//! the series: endpoints, overall token value growth and the average time
//! between rebases.
//!
//! Two percentages are kept per event because they answer different
//! questions:
//! - `percent_increase` compares the displayed token values
//! - `percentage_change` compares the divisors themselves, in basis points
//!
//! They agree only when `new_value / old_value == old_divisor / new_divisor`
//! exactly, which display rounding usually breaks.

use crate::enrich::EnrichedRebase;
use alloy::primitives::{U256, U512};
use serde::Serialize;
use std::fmt;

const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_MINUTE: f64 = 60.0;
const BASIS_POINTS: u64 = 10_000;

/// An enriched rebase with its divisor-driven percentage change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedRebase {
    /// The enriched event
    #[serde(flatten)]
    pub enriched: EnrichedRebase,
    /// `(old_divisor - new_divisor) / old_divisor * 100` at basis-point precision
    pub percentage_change: f64,
}

/// First or last event of the series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesEndpoint {
    /// Block of the event
    pub block_number: u64,
    /// Formatted date of the event
    pub formatted_date: String,
}

/// Average time between consecutive rebases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cadence {
    /// Mean gap in seconds
    pub average_seconds: f64,
    /// Whole days in the mean gap
    pub days: u64,
    /// Whole hours after removing days
    pub hours: u64,
    /// Whole minutes after removing hours
    pub minutes: u64,
}

impl Cadence {
    /// Decompose a mean gap into whole days, hours and minutes (floored, no carry).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_average_seconds(average_seconds: f64) -> Self {
        Self {
            average_seconds,
            days: (average_seconds / SECONDS_PER_DAY).floor() as u64,
            hours: ((average_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR).floor() as u64,
            minutes: ((average_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE).floor() as u64,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d {}h {}m", self.days, self.hours, self.minutes)
    }
}

/// Aggregate statistics over a rebase series.
///
/// Fields that need at least one event (endpoints, values, growth) or two
/// events (cadence) are `None` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Number of rebases
    pub event_count: usize,
    /// Earliest rebase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<SeriesEndpoint>,
    /// Latest rebase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<SeriesEndpoint>,
    /// Token value before the first rebase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
    /// Token value after the latest rebase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
    /// `(current / initial - 1) * 100`, 4 fractional digits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_value_growth: Option<String>,
    /// Mean time between consecutive rebases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_interval: Option<Cadence>,
    /// Every rebase with its percentage change
    pub events: Vec<AnalyzedRebase>,
}

/// Divisor-driven percentage change of a single rebase.
///
/// Computed as truncated basis points `(old - new) * 10000 / old`, then
/// divided by 100. A divisor increase yields a negative change; a zero old
/// divisor yields `0.0`.
#[must_use]
pub fn percentage_change(old_divisor: U256, new_divisor: U256) -> f64 {
    if old_divisor.is_zero() {
        return 0.0;
    }

    let (delta, negative) = if new_divisor <= old_divisor {
        (old_divisor - new_divisor, false)
    } else {
        (new_divisor - old_divisor, true)
    };

    // Widened so that divisors near U256::MAX cannot overflow the product
    let basis_points =
        U512::from(delta) * U512::from(BASIS_POINTS) / U512::from(old_divisor);
    #[allow(clippy::cast_precision_loss)]
    let percent = u128::try_from(basis_points).unwrap_or(u128::MAX) as f64 / 100.0;

    if negative {
        -percent
    } else {
        percent
    }
}

/// Summarize an ordered rebase series.
///
/// `events` must be in block order, as produced by the scanner. The function
/// is pure: analyzing the same slice twice yields equal summaries.
#[must_use]
pub fn analyze(events: &[EnrichedRebase]) -> AnalysisSummary {
    let analyzed: Vec<AnalyzedRebase> = events
        .iter()
        .map(|enriched| AnalyzedRebase {
            percentage_change: percentage_change(
                enriched.event.old_divisor,
                enriched.event.new_divisor,
            ),
            enriched: enriched.clone(),
        })
        .collect();

    let endpoint = |e: &EnrichedRebase| SeriesEndpoint {
        block_number: e.event.block_number,
        formatted_date: e.formatted_date.clone(),
    };

    let (first, last) = match (events.first(), events.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return AnalysisSummary {
                event_count: 0,
                first: None,
                last: None,
                initial_value: None,
                current_value: None,
                total_value_growth: None,
                average_interval: None,
                events: analyzed,
            }
        }
    };

    AnalysisSummary {
        event_count: events.len(),
        first: Some(endpoint(first)),
        last: Some(endpoint(last)),
        initial_value: Some(first.old_value.clone()),
        current_value: Some(last.new_value.clone()),
        total_value_growth: Some(total_value_growth(&first.old_value, &last.new_value)),
        average_interval: average_interval(events),
        events: analyzed,
    }
}

fn total_value_growth(initial_value: &str, current_value: &str) -> String {
    let growth = match (initial_value.parse::<f64>(), current_value.parse::<f64>()) {
        (Ok(initial), Ok(current)) if initial != 0.0 => (current / initial - 1.0) * 100.0,
        _ => f64::NAN,
    };

    format!("{growth:.4}")
}

fn average_interval(events: &[EnrichedRebase]) -> Option<Cadence> {
    if events.len() < 2 {
        return None;
    }

    let total: i128 = events
        .windows(2)
        .map(|pair| i128::from(pair[1].timestamp) - i128::from(pair[0].timestamp))
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let average = total as f64 / (events.len() - 1) as f64;

    Some(Cadence::from_average_seconds(average))
}
