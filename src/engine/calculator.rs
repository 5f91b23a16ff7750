use chrono::NaiveDate;

use crate::series::TimeSeriesTable;
use crate::types::{Change, LookbackWindow, MissingReason};

/// Changes for every configured window, each evaluated at the table's latest row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTable {
    pub(crate) latest_date: Option<NaiveDate>,
    pub(crate) windows: Vec<WindowChanges>,
}

/// One window's changes, in table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowChanges {
    pub window: LookbackWindow,
    pub changes: Vec<(String, Change)>,
}

impl ChangeTable {
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.latest_date
    }

    /// Windows in configured order.
    pub fn windows(&self) -> &[WindowChanges] {
        &self.windows
    }

    pub fn get(&self, window: LookbackWindow, symbol: &str) -> Option<Change> {
        self.windows
            .iter()
            .find(|w| w.window == window)?
            .changes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, c)| *c)
    }

    /// Number of cells without a value, across all windows.
    pub fn missing_count(&self) -> usize {
        self.windows
            .iter()
            .flat_map(|w| w.changes.iter())
            .filter(|(_, c)| c.is_missing())
            .count()
    }
}

/// Windowed-difference percent change over a whole column: element `i` compares
/// row `i` against row `i - window`. The first `window` elements have no base row.
pub fn pct_change_series(values: &[Option<f64>], window: LookbackWindow) -> Vec<Change> {
    let n = window.rows();
    values
        .iter()
        .enumerate()
        .map(|(i, &latest)| {
            if i < n {
                Change::Missing(MissingReason::InsufficientHistory { available_rows: i + 1 })
            } else {
                Change::between(latest, values[i - n])
            }
        })
        .collect()
}

/// Percent change of the latest row against the row `window` rows earlier, for
/// every (window, symbol) pair. A table shorter than `window + 1` rows yields
/// `InsufficientHistory` for that window rather than a fault.
pub fn calculate(table: &TimeSeriesTable, windows: &[LookbackWindow]) -> ChangeTable {
    let rows = table.len();

    let windows = windows
        .iter()
        .map(|&window| {
            let changes = table
                .columns()
                .iter()
                .map(|col| {
                    let change = pct_change_series(&col.adj_close, window)
                        .last()
                        .copied()
                        .unwrap_or(Change::Missing(MissingReason::InsufficientHistory {
                            available_rows: rows,
                        }));
                    (col.symbol.clone(), change)
                })
                .collect();
            WindowChanges { window, changes }
        })
        .collect();

    ChangeTable {
        latest_date: table.latest_date(),
        windows,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
