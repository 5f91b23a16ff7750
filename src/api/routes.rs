use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::health::HealthState;
use crate::cache::{CacheKey, SeriesCache};
use crate::config::{parse_symbols, Config};
use crate::engine::summary::SummaryRow;
use crate::engine::{run_cycle, CycleReport, EngineConfig};
use crate::error::{AppError, Result};
use crate::provider::PriceProvider;
use crate::series::{SymbolSeries, TimeSeriesTable};
use crate::types::{Change, DateRange, MissingReason};

#[derive(Clone)]
pub struct ApiState {
    pub cfg: Arc<Config>,
    pub engine: Arc<EngineConfig>,
    pub provider: Arc<dyn PriceProvider>,
    pub cache: Arc<SeriesCache>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/changes", get(get_changes))
        .route("/series", get(get_series))
        .route("/cache/invalidate", post(invalidate_cache))
        .route("/health", get(get_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CycleQuery {
    /// Comma-separated tickers; column order follows this list.
    pub symbols: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Bypass the cache for this request's key.
    pub refresh: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SummaryResponse {
    pub latest_date: Option<NaiveDate>,
    pub windows: Vec<usize>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Serialize)]
pub struct ChangesResponse {
    pub latest_date: Option<NaiveDate>,
    pub windows: Vec<WindowChangesResponse>,
}

#[derive(Serialize)]
pub struct WindowChangesResponse {
    pub window: usize,
    pub changes: Vec<SymbolChangeResponse>,
}

#[derive(Serialize)]
pub struct SymbolChangeResponse {
    pub symbol: String,
    pub value: Option<f64>,
    pub missing: Option<MissingReason>,
}

#[derive(Serialize)]
pub struct SeriesResponse {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<SymbolSeries>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cached_tables: usize,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle_at: Option<u64>,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub evicted: usize,
}

// ---------------------------------------------------------------------------
// Request resolution
// ---------------------------------------------------------------------------

/// Fills omitted query parameters from config. `today` anchors the default range.
pub fn resolve_request(cfg: &Config, query: &CycleQuery, today: NaiveDate) -> Result<CacheKey> {
    let symbols = match query.symbols.as_deref() {
        Some(raw) => parse_symbols(raw),
        None => cfg.default_symbols.clone(),
    };
    if symbols.is_empty() {
        return Err(AppError::Config("symbols must name at least one ticker".to_string()));
    }

    let end = query.end.unwrap_or(today);
    let range = match query.start {
        Some(start) => DateRange::new(start, end)?,
        None => DateRange::ending_at(end, cfg.history_days),
    };

    Ok(CacheKey { symbols, range })
}

async fn load_table(state: &ApiState, query: &CycleQuery) -> Result<Arc<TimeSeriesTable>> {
    let today = chrono::Local::now().date_naive();
    let key = resolve_request(&state.cfg, query, today)?;
    if query.refresh.unwrap_or(false) {
        state.cache.invalidate(&key);
    }
    state
        .cache
        .get_or_fetch(state.provider.as_ref(), &key.symbols, key.range)
        .await
}

async fn cycle(state: &ApiState, query: &CycleQuery) -> Result<CycleReport> {
    let result = match load_table(state, query).await {
        Ok(table) => run_cycle(&table, &state.engine),
        Err(e) => Err(e),
    };

    match &result {
        Ok(_) => state.health.record_success(now_secs()),
        Err(e) => {
            warn!("Cycle aborted: {e}");
            state.health.record_failure();
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_summary(
    State(state): State<ApiState>,
    Query(params): Query<CycleQuery>,
) -> std::result::Result<Json<SummaryResponse>, AppError> {
    let report = cycle(&state, &params).await?;

    Ok(Json(SummaryResponse {
        latest_date: report.latest_date,
        windows: report.windows.iter().map(|w| w.rows()).collect(),
        rows: report.rows,
    }))
}

async fn get_changes(
    State(state): State<ApiState>,
    Query(params): Query<CycleQuery>,
) -> std::result::Result<Json<ChangesResponse>, AppError> {
    let report = cycle(&state, &params).await?;

    let windows = report
        .changes
        .windows()
        .iter()
        .map(|wc| WindowChangesResponse {
            window: wc.window.rows(),
            changes: wc
                .changes
                .iter()
                .map(|(symbol, change)| SymbolChangeResponse {
                    symbol: symbol.clone(),
                    value: change.value(),
                    missing: match change {
                        Change::Missing(reason) => Some(*reason),
                        Change::Value(_) => None,
                    },
                })
                .collect(),
        })
        .collect();

    Ok(Json(ChangesResponse {
        latest_date: report.latest_date,
        windows,
    }))
}

async fn get_series(
    State(state): State<ApiState>,
    Query(params): Query<CycleQuery>,
) -> std::result::Result<Json<SeriesResponse>, AppError> {
    let table = load_table(&state, &params).await?;

    Ok(Json(SeriesResponse {
        dates: table.dates().to_vec(),
        columns: table.columns().to_vec(),
    }))
}

async fn invalidate_cache(State(state): State<ApiState>) -> Json<InvalidateResponse> {
    let evicted = state.cache.invalidate_all();
    Json(InvalidateResponse { evicted })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_cycle_at();
    Json(HealthResponse {
        status: "ok",
        cached_tables: state.cache.len(),
        cycles_completed: state.health.cycles_completed(),
        cycles_failed: state.health.cycles_failed(),
        last_cycle_at: (last > 0).then_some(last),
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
