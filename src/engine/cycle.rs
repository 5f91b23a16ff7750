use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::calculator::{calculate, ChangeTable};
use crate::engine::classifier::{BucketGlyphs, SeverityScale};
use crate::engine::summary::{assemble, SummaryRow};
use crate::engine::verifier::verify;
use crate::error::Result;
use crate::series::TimeSeriesTable;
use crate::types::LookbackWindow;

/// Immutable per-run configuration: which windows to compute and how to bucket them.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub windows: Vec<LookbackWindow>,
    pub scale: SeverityScale,
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut scale = SeverityScale::symmetric(cfg.severity_small_move, cfg.severity_big_move);
        if let Some(glyphs) = &cfg.severity_glyphs {
            scale = scale.with_glyphs(BucketGlyphs::from_ordered(glyphs.clone()));
        }
        Ok(Self {
            windows: LookbackWindow::from_rows(&cfg.lookback_windows)?,
            scale,
        })
    }
}

/// Everything one cycle produces.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub latest_date: Option<NaiveDate>,
    pub windows: Vec<LookbackWindow>,
    pub rows: Vec<SummaryRow>,
    pub changes: ChangeTable,
}

/// Calculate, verify, then classify and assemble. Runs to completion on the given
/// snapshot; a verification failure aborts the cycle before any row is built.
pub fn run_cycle(table: &TimeSeriesTable, engine: &EngineConfig) -> Result<CycleReport> {
    let started = Instant::now();

    let changes = calculate(table, &engine.windows);
    verify(table, &changes)?;

    let missing = changes.missing_count();
    if missing > 0 {
        warn!(
            event = "MISSING_HISTORY",
            cells = missing,
            rows = table.len(),
            "{missing} change cells have no value (short history or absent observations)"
        );
    }

    let rows = assemble(table, &changes, &engine.scale);

    info!(
        event = "CYCLE_COMPLETE",
        symbols = rows.len(),
        windows = engine.windows.len(),
        rows = table.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "Cycle complete | {} symbols x {} windows | latest: {}",
        rows.len(),
        engine.windows.len(),
        table
            .latest_date()
            .map_or_else(|| "n/a".to_string(), |d| d.to_string()),
    );

    Ok(CycleReport {
        latest_date: changes.latest_date(),
        windows: engine.windows.clone(),
        rows,
        changes,
    })
}
