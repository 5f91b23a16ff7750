use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::types::DailyBar;

/// One symbol's columns, one entry per table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSeries {
    pub symbol: String,
    pub adj_close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
}

/// Date-indexed rows with one adjusted-close and one volume column per symbol.
///
/// Construction enforces the invariants every calculation relies on: dates are
/// strictly increasing, every column has one entry per row, and symbols are unique.
/// "N rows back" is therefore always well defined. Gaps in the calendar (weekends,
/// holidays) are not rows and do not count toward a look-back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<SymbolSeries>,
}

impl TimeSeriesTable {
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<SymbolSeries>) -> Result<Self> {
        ensure_strictly_increasing(&dates)?;

        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.symbol.as_str()) {
                return Err(AppError::DuplicateSymbol(col.symbol.clone()));
            }
            for actual in [col.adj_close.len(), col.volume.len()] {
                if actual != dates.len() {
                    return Err(AppError::RaggedColumn {
                        symbol: col.symbol.clone(),
                        expected: dates.len(),
                        actual,
                    });
                }
            }
        }

        Ok(Self { dates, columns })
    }

    /// Outer-joins independently fetched per-symbol bars onto the sorted union of
    /// their dates. A symbol with no bar on some date gets an absent observation.
    /// Within one symbol, a repeated date keeps the last bar.
    pub fn align(per_symbol: Vec<(String, Vec<DailyBar>)>) -> Result<Self> {
        let mut keyed: Vec<(String, BTreeMap<NaiveDate, DailyBar>)> = Vec::with_capacity(per_symbol.len());
        for (symbol, bars) in per_symbol {
            let by_date: BTreeMap<NaiveDate, DailyBar> =
                bars.into_iter().map(|b| (b.date, b)).collect();
            keyed.push((symbol, by_date));
        }

        let dates: Vec<NaiveDate> = keyed
            .iter()
            .flat_map(|(_, bars)| bars.keys().copied())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = keyed
            .into_iter()
            .map(|(symbol, bars)| {
                let (adj_close, volume) = dates
                    .iter()
                    .map(|d| match bars.get(d) {
                        Some(bar) => (bar.adj_close, bar.volume),
                        None => (None, None),
                    })
                    .unzip();
                SymbolSeries { symbol, adj_close, volume }
            })
            .collect();

        Self::new(dates, columns)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Symbols in input column order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.symbol.as_str())
    }

    pub fn columns(&self) -> &[SymbolSeries] {
        &self.columns
    }

    pub fn column(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.columns.iter().find(|c| c.symbol == symbol)
    }

    pub fn adj_close(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.column(symbol).map(|c| c.adj_close.as_slice())
    }

    pub fn volume(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.column(symbol).map(|c| c.volume.as_slice())
    }

    /// Adjusted close on the latest row. `None` if the table is empty or the value is absent.
    pub fn latest_close(&self, symbol: &str) -> Option<f64> {
        self.adj_close(symbol)?.last().copied().flatten()
    }
}

fn ensure_strictly_increasing(dates: &[NaiveDate]) -> Result<()> {
    for (row, pair) in dates.windows(2).enumerate() {
        let (previous, current) = (pair[0], pair[1]);
        if current == previous {
            return Err(AppError::DuplicateDate { row: row + 1, date: current });
        }
        if current < previous {
            return Err(AppError::UnsortedInput {
                row: row + 1,
                previous,
                current,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
