use tracing::error;

use crate::engine::calculator::ChangeTable;
use crate::error::{AppError, Result};
use crate::series::TimeSeriesTable;

/// Recomputes every cell with the direct ratio against `latest_index - window` and
/// requires exact equality with the calculator's output. The first disagreement
/// fails the whole batch.
///
/// Both paths perform the same `latest / base - 1.0` in the same order, so any
/// difference means the two disagree on which rows are compared.
pub fn verify(table: &TimeSeriesTable, changes: &ChangeTable) -> Result<()> {
    for wc in changes.windows() {
        let n = wc.window.rows();

        if wc.changes.len() != table.columns().len() {
            let missing = table
                .symbols()
                .find(|s| !wc.changes.iter().any(|(c, _)| c == s))
                .unwrap_or_default();
            return Err(mismatch(missing, n, None, None));
        }

        for (col, (symbol, calculated)) in table.columns().iter().zip(&wc.changes) {
            if &col.symbol != symbol {
                return Err(mismatch(symbol, n, calculated.value(), None));
            }

            let direct = direct_change(&col.adj_close, n);
            let calculated = calculated.value();
            if !same(calculated, direct) {
                return Err(mismatch(symbol, n, calculated, direct));
            }
        }
    }

    Ok(())
}

/// `values[last] / values[last - n] - 1`, or `None` when either row is absent,
/// out of range, or the ratio is not finite.
fn direct_change(values: &[Option<f64>], n: usize) -> Option<f64> {
    let latest_index = values.len().checked_sub(1)?;
    let base_index = latest_index.checked_sub(n)?;
    let latest = values[latest_index]?;
    let base = values[base_index]?;
    let change = latest / base - 1.0;
    change.is_finite().then_some(change)
}

fn same(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
        (None, None) => true,
        _ => false,
    }
}

fn mismatch(symbol: &str, window: usize, calculated: Option<f64>, direct: Option<f64>) -> AppError {
    error!(
        event = "VERIFICATION_MISMATCH",
        symbol,
        window,
        calculated = ?calculated,
        direct = ?direct,
        "Calculator and direct ratio disagree for {symbol} over {window} rows"
    );
    AppError::VerificationMismatch {
        symbol: symbol.to_string(),
        window,
        calculated,
        direct,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::calculator::calculate;
    use crate::engine::fixtures::table_of;
    use crate::types::{Change, LookbackWindow};

    fn windows(rows: &[usize]) -> Vec<LookbackWindow> {
        LookbackWindow::from_rows(rows).unwrap()
    }

    #[test]
    fn calculator_output_passes() {
        let table = table_of(&[
            ("AAPL", &[100.0, 101.0, 99.5, 104.0, 103.25, 110.0]),
            ("TSLA", &[250.0, 240.0, 230.0, 220.0, 210.0, 212.5]),
        ]);
        let changes = calculate(&table, &windows(&[1, 2, 5, 30]));
        assert!(verify(&table, &changes).is_ok());
    }

    #[test]
    fn off_by_one_offset_is_caught() {
        let closes = [100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 95.0, 100.0, 110.0];
        let table = table_of(&[("AAPL", &closes)]);
        let mut changes = calculate(&table, &windows(&[1, 7]));

        // Compare against row -1-(7+1) instead of row -1-7.
        changes.windows[1].changes[0].1 = Change::Value(110.0 / closes[0] - 1.0);
        changes.windows[0].changes[0].1 = Change::Value(110.0 / closes[6] - 1.0);

        match verify(&table, &changes) {
            Err(AppError::VerificationMismatch { symbol, window, calculated, direct }) => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(window, 1);
                assert_eq!(calculated, Some(110.0 / 95.0 - 1.0));
                assert_eq!(direct, Some(110.0 / 100.0 - 1.0));
            }
            other => panic!("expected VerificationMismatch, got {other:?}"),
        }
    }

    #[test]
    fn value_where_history_is_missing_is_caught() {
        let table = table_of(&[("AAPL", &[100.0, 110.0])]);
        let mut changes = calculate(&table, &windows(&[7]));
        changes.windows[0].changes[0].1 = Change::Value(0.0);

        let err = verify(&table, &changes).unwrap_err();
        assert!(matches!(
            err,
            AppError::VerificationMismatch { window: 7, calculated: Some(_), direct: None, .. }
        ));
    }

    #[test]
    fn dropped_symbol_is_caught() {
        let table = table_of(&[("AAPL", &[100.0, 110.0]), ("MSFT", &[10.0, 11.0])]);
        let mut changes = calculate(&table, &windows(&[1]));
        changes.windows[0].changes.pop();

        let err = verify(&table, &changes).unwrap_err();
        assert!(matches!(err, AppError::VerificationMismatch { ref symbol, .. } if symbol == "MSFT"));
    }

    #[test]
    fn absent_cells_agree() {
        let table = table_of(&[("AAPL", &[100.0])]);
        let changes = calculate(&table, &windows(&[1, 365]));
        assert!(verify(&table, &changes).is_ok());
    }
}
