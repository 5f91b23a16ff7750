use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Input bars and ranges
// ---------------------------------------------------------------------------

/// One trading day for one symbol, as delivered by a price provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

/// Inclusive calendar date range requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AppError::Config(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending at `end`.
    pub fn ending_at(end: NaiveDate, days: i64) -> Self {
        let start = end - chrono::Duration::days(days.max(0));
        Self { start, end }
    }
}

// ---------------------------------------------------------------------------
// Look-back windows
// ---------------------------------------------------------------------------

/// A count of trading rows to look back from the latest observation.
/// Offsets count rows of the table, never calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LookbackWindow(usize);

impl LookbackWindow {
    pub fn new(rows: usize) -> Result<Self> {
        if rows == 0 {
            return Err(AppError::InvalidWindow(rows));
        }
        Ok(Self(rows))
    }

    pub fn rows(self) -> usize {
        self.0
    }

    /// Builds an ordered window set, rejecting zero entries.
    pub fn from_rows(rows: &[usize]) -> Result<Vec<Self>> {
        rows.iter().map(|&n| Self::new(n)).collect()
    }
}

impl std::fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.0)
    }
}

// ---------------------------------------------------------------------------
// Percent changes
// ---------------------------------------------------------------------------

/// Why a percent change has no value for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MissingReason {
    /// The table has fewer than `window + 1` rows.
    InsufficientHistory { available_rows: usize },
    /// The latest or the base observation is absent. Nothing is filled in.
    MissingObservation,
    /// The ratio was not finite (a zero base price).
    NonFinite,
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingReason::InsufficientHistory { available_rows } => {
                write!(f, "insufficient_history ({available_rows} rows)")
            }
            MissingReason::MissingObservation => write!(f, "missing_observation"),
            MissingReason::NonFinite => write!(f, "non_finite"),
        }
    }
}

/// Percent change for one (symbol, window) cell, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Value(f64),
    Missing(MissingReason),
}

impl Change {
    pub fn value(&self) -> Option<f64> {
        match self {
            Change::Value(v) => Some(*v),
            Change::Missing(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Change::Missing(_))
    }

    /// `latest / base - 1`, with the missing-value policy shared by the calculator and verifier.
    pub fn between(latest: Option<f64>, base: Option<f64>) -> Self {
        match (latest, base) {
            (Some(latest), Some(base)) => {
                let change = latest / base - 1.0;
                if change.is_finite() {
                    Change::Value(change)
                } else {
                    Change::Missing(MissingReason::NonFinite)
                }
            }
            _ => Change::Missing(MissingReason::MissingObservation),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity classification
// ---------------------------------------------------------------------------

/// Five ordered buckets over a percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBucket {
    /// change < -10%
    BigDrop,
    /// -10% <= change <= -1%
    SmallDrop,
    /// -1% < change < 1%
    Neutral,
    /// 1% <= change <= 10%
    SmallRise,
    /// change > 10%
    BigRise,
}

impl SeverityBucket {
    pub fn glyph(self) -> &'static str {
        match self {
            SeverityBucket::BigDrop => "📉",
            SeverityBucket::SmallDrop => "🔻",
            SeverityBucket::Neutral => "",
            SeverityBucket::SmallRise => "🟢",
            SeverityBucket::BigRise => "🚀",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityBucket::BigDrop => "big drop",
            SeverityBucket::SmallDrop => "small drop",
            SeverityBucket::Neutral => "neutral",
            SeverityBucket::SmallRise => "small rise",
            SeverityBucket::BigRise => "big rise",
        }
    }
}

impl std::fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SeverityBucket::BigDrop => "big_drop",
            SeverityBucket::SmallDrop => "small_drop",
            SeverityBucket::Neutral => "neutral",
            SeverityBucket::SmallRise => "small_rise",
            SeverityBucket::BigRise => "big_rise",
        };
        write!(f, "{s}")
    }
}
