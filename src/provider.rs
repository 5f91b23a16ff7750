use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::series::TimeSeriesTable;
use crate::types::{DailyBar, DateRange};

/// Source of daily adjusted-close and volume history.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// A rectangular, ascending table with one column per requested symbol, in request order.
    async fn fetch(&self, symbols: &[String], range: DateRange) -> Result<TimeSeriesTable>;
}

// ---------------------------------------------------------------------------
// Chart API response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Daily bars from the public chart endpoint, one request per symbol.
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) stock-dashboard/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.data_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_symbol(&self, symbol: &str, range: DateRange) -> Result<Vec<DailyBar>> {
        let (period1, period2) = range_to_epoch(range);
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,splits".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            // The API reports unknown symbols as 404 with a chart.error body.
            let detail = serde_json::from_str::<ChartEnvelope>(&body)
                .ok()
                .and_then(|e| e.chart.error)
                .and_then(|e| e.description.or(e.code))
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(AppError::Provider(format!("{symbol}: HTTP {status}: {detail}")));
        }

        let bars = parse_chart(symbol, &body)?;
        debug!(symbol, bars = bars.len(), "Fetched daily bars");
        Ok(bars)
    }
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    async fn fetch(&self, symbols: &[String], range: DateRange) -> Result<TimeSeriesTable> {
        info!("🏃 Fetching data for {symbols:?} - {} to {}", range.start, range.end);

        let mut per_symbol = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let bars = self.fetch_symbol(symbol, range).await?;
            per_symbol.push((symbol.clone(), bars));
        }
        let table = TimeSeriesTable::align(per_symbol)?;

        info!(
            "✅ Fetched data for {symbols:?} - {} to {} ({} rows)",
            range.start,
            range.end,
            table.len()
        );
        Ok(table)
    }
}

/// `period1` at the start of `range.start`, `period2` at the end of `range.end` (UTC).
fn range_to_epoch(range: DateRange) -> (i64, i64) {
    let start = range.start.and_hms_opt(0, 0, 0).map_or(0, |t| t.and_utc().timestamp());
    let end = range
        .end
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(i64::MAX, |t| t.and_utc().timestamp());
    (start, end)
}

/// Parses one chart response into bars keyed by exchange-local trading date.
fn parse_chart(symbol: &str, body: &str) -> Result<Vec<DailyBar>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        return Err(AppError::Provider(format!(
            "{symbol}: {}",
            err.description.or(err.code).unwrap_or_else(|| "unknown chart error".to_string())
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(AppError::Provider(format!("{symbol}: empty chart result")));
    };

    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();
    let volume = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.volume)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(date) = trading_date(ts, result.meta.gmtoffset) else {
            return Err(AppError::Provider(format!("{symbol}: timestamp {ts} out of range")));
        };
        bars.push(DailyBar {
            date,
            adj_close: adjclose.get(i).copied().flatten(),
            volume: volume.get(i).copied().flatten(),
        });
    }
    Ok(bars)
}

fn trading_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmtoffset, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAPL", "gmtoffset": -14400 },
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{ "close": [185.6, 184.2, 181.9], "volume": [82488700, null, 71983600] }],
                    "adjclose": [{ "adjclose": [184.7, null, 181.0] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_bars_with_local_dates_and_gaps() {
        let bars = parse_chart("AAPL", SAMPLE).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[2].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(bars[0].adj_close, Some(184.7));
        assert_eq!(bars[1].adj_close, None);
        assert_eq!(bars[1].volume, None);
        assert_eq!(bars[2].volume, Some(71983600.0));
    }

    #[test]
    fn chart_error_becomes_provider_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("ZZZZ", body).unwrap_err();
        assert!(matches!(err, AppError::Provider(msg) if msg.contains("delisted")));
    }

    #[test]
    fn range_end_is_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        )
        .unwrap();
        let (p1, p2) = range_to_epoch(range);
        assert_eq!(p1, 1704153600);
        assert_eq!(p2, 1704412800);
    }
}
