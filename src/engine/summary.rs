use serde::Serialize;

use crate::config::MISSING_PLACEHOLDER;
use crate::engine::calculator::ChangeTable;
use crate::engine::classifier::{quantize, Classification, SeverityScale};
use crate::series::TimeSeriesTable;
use crate::types::{Change, LookbackWindow, MissingReason, SeverityBucket};

/// One presentation row: latest price plus every configured window's change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub latest_price: Option<f64>,
    pub changes: Vec<WindowCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowCell {
    pub window: LookbackWindow,
    /// Raw fraction, unrounded.
    pub value: Option<f64>,
    pub bucket: Option<SeverityBucket>,
    /// Human-readable bucket name, `None` when absent.
    pub label: Option<&'static str>,
    /// `"12.3% 🚀"`, `"0.4%"` for neutral, or the placeholder when absent.
    pub display: String,
}

/// One row per table column, in column order.
pub fn assemble(table: &TimeSeriesTable, changes: &ChangeTable, scale: &SeverityScale) -> Vec<SummaryRow> {
    table
        .symbols()
        .map(|symbol| {
            let cells = changes
                .windows()
                .iter()
                .map(|wc| {
                    let change = changes
                        .get(wc.window, symbol)
                        .unwrap_or(Change::Missing(MissingReason::MissingObservation));
                    build_cell(wc.window, &change, scale)
                })
                .collect();

            SummaryRow {
                symbol: symbol.to_string(),
                latest_price: table.latest_close(symbol),
                changes: cells,
            }
        })
        .collect()
}

fn build_cell(window: LookbackWindow, change: &Change, scale: &SeverityScale) -> WindowCell {
    let classification = scale.classify_change(change);
    WindowCell {
        window,
        value: change.value(),
        bucket: classification.bucket(),
        label: classification.bucket().map(SeverityBucket::label),
        display: format_change(change.value(), classification, scale),
    }
}

/// Percent to one decimal place, followed by the scale's glyph for the bucket when it has one.
pub fn format_change(value: Option<f64>, classification: Classification, scale: &SeverityScale) -> String {
    match (value, classification) {
        (Some(v), Classification::Bucket(bucket)) => {
            let mut pct = quantize(v) * 100.0;
            if pct == 0.0 {
                pct = 0.0; // no "-0.0%"
            }
            let glyph = scale.glyph(bucket);
            if glyph.is_empty() {
                format!("{pct:.1}%")
            } else {
                format!("{pct:.1}% {glyph}")
            }
        }
        _ => MISSING_PLACEHOLDER.to_string(),
    }
}
