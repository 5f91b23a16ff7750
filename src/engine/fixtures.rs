//! Table builders shared by the engine tests.

use chrono::NaiveDate;

use crate::series::{SymbolSeries, TimeSeriesTable};

/// Consecutive daily rows from 2024-01-01, one fully observed column per entry.
pub(crate) fn table_of(columns: &[(&str, &[f64])]) -> TimeSeriesTable {
    let rows = columns.first().map_or(0, |(_, v)| v.len());
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..rows)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let columns = columns
        .iter()
        .map(|(symbol, closes)| SymbolSeries {
            symbol: symbol.to_string(),
            adj_close: closes.iter().map(|&c| Some(c)).collect(),
            volume: closes.iter().map(|_| Some(1.0)).collect(),
        })
        .collect();
    TimeSeriesTable::new(dates, columns).unwrap()
}
