use crate::error::{AppError, Result};

pub const DATA_API_URL: &str = "https://query1.finance.yahoo.com";

/// Symbols shown when a request does not name any.
pub const DEFAULT_STOCK_SYMBOLS: &[&str] = &["NVDA", "META", "AMZN", "MSFT", "SHOP", "TSLA", "AAPL"];

/// Look-back windows in trading rows, not calendar days.
pub const DEFAULT_LOOKBACK_WINDOWS: &[usize] = &[1, 7, 30, 90, 180, 365];

/// Calendar days of history fetched when a request gives no start date.
/// 365 trading rows need roughly 530 calendar days once weekends and holidays drop out.
pub const DEFAULT_HISTORY_DAYS: i64 = 560;

/// Provider request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// How long a fetched table stays valid in the series cache (seconds).
pub const CACHE_TTL_SECS: u64 = 3600;

/// Cache sweeper interval (seconds).
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 300;

/// Rendered in place of a change that could not be computed.
pub const MISSING_PLACEHOLDER: &str = "N/A";

/// Severity thresholds, as fractions (0.01 == 1%).
pub mod severity_thresholds {
    /// Changes strictly below this are a big drop.
    pub const BIG_DROP_BELOW: f64 = -0.10;
    /// Changes at or below this (and not a big drop) are a small drop.
    pub const SMALL_DROP_FROM: f64 = -0.01;
    /// Changes at or above this (and not a big rise) are a small rise.
    pub const SMALL_RISE_FROM: f64 = 0.01;
    /// Changes strictly above this are a big rise.
    pub const BIG_RISE_ABOVE: f64 = 0.10;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_api_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Symbols used when a request omits them (DEFAULT_SYMBOLS, comma-separated)
    pub default_symbols: Vec<String>,
    /// Ordered look-back windows in trading rows (LOOKBACK_WINDOWS, comma-separated)
    pub lookback_windows: Vec<usize>,
    /// Default range start, in calendar days before today (HISTORY_DAYS)
    pub history_days: i64,
    pub cache_ttl_secs: u64,
    pub cache_sweep_interval_secs: u64,
    /// Symmetric small-move threshold (SEVERITY_SMALL_MOVE)
    pub severity_small_move: f64,
    /// Symmetric big-move threshold (SEVERITY_BIG_MOVE)
    pub severity_big_move: f64,
    /// Bucket glyphs from big drop to big rise (SEVERITY_GLYPHS, five comma-separated entries)
    pub severity_glyphs: Option<[String; 5]>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_symbols = match lookup("DEFAULT_SYMBOLS") {
            Some(raw) => parse_symbols(&raw),
            None => DEFAULT_STOCK_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        if default_symbols.is_empty() {
            return Err(AppError::Config("DEFAULT_SYMBOLS must name at least one symbol".to_string()));
        }

        let lookback_windows = match lookup("LOOKBACK_WINDOWS") {
            Some(raw) => parse_windows(&raw)?,
            None => DEFAULT_LOOKBACK_WINDOWS.to_vec(),
        };

        let severity_small_move = parse_or(&lookup, "SEVERITY_SMALL_MOVE", severity_thresholds::SMALL_RISE_FROM)?;
        let severity_big_move = parse_or(&lookup, "SEVERITY_BIG_MOVE", severity_thresholds::BIG_RISE_ABOVE)?;
        if !(severity_small_move > 0.0 && severity_small_move < severity_big_move) {
            return Err(AppError::Config(format!(
                "severity thresholds must satisfy 0 < small < big (got small={severity_small_move}, big={severity_big_move})"
            )));
        }

        let severity_glyphs = lookup("SEVERITY_GLYPHS").map(|raw| parse_glyphs(&raw)).transpose()?;

        Ok(Self {
            data_api_url: lookup("DATA_API_URL").unwrap_or_else(|| DATA_API_URL.to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            default_symbols,
            lookback_windows,
            history_days: parse_or(&lookup, "HISTORY_DAYS", DEFAULT_HISTORY_DAYS)?,
            cache_ttl_secs: parse_or(&lookup, "CACHE_TTL_SECS", CACHE_TTL_SECS)?,
            cache_sweep_interval_secs: parse_or(&lookup, "CACHE_SWEEP_INTERVAL_SECS", CACHE_SWEEP_INTERVAL_SECS)?,
            severity_small_move,
            severity_big_move,
            severity_glyphs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

/// Splits a comma-separated symbol list, upper-casing and dropping blanks.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses an ordered, duplicate-free list of positive row counts.
pub fn parse_windows(raw: &str) -> Result<Vec<usize>> {
    let mut windows = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let n = part
            .parse::<usize>()
            .map_err(|_| AppError::Config(format!("LOOKBACK_WINDOWS entry {part:?} is not a number")))?;
        if n == 0 {
            return Err(AppError::Config("LOOKBACK_WINDOWS entries must be positive".to_string()));
        }
        if windows.contains(&n) {
            return Err(AppError::Config(format!("LOOKBACK_WINDOWS lists {n} twice")));
        }
        windows.push(n);
    }
    if windows.is_empty() {
        return Err(AppError::Config("LOOKBACK_WINDOWS must list at least one window".to_string()));
    }
    Ok(windows)
}

/// Parses exactly five comma-separated glyphs. Entries may be blank (no suffix).
pub fn parse_glyphs(raw: &str) -> Result<[String; 5]> {
    let parts: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
    let count = parts.len();
    <[String; 5]>::try_from(parts).map_err(|_| {
        AppError::Config(format!(
            "SEVERITY_GLYPHS must list five glyphs, big drop to big rise (got {count})"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_cover_full_window_set() {
        let cfg = config_with(&[]).unwrap();
        assert_eq!(cfg.lookback_windows, vec![1, 7, 30, 90, 180, 365]);
        assert_eq!(cfg.default_symbols.len(), 7);
        assert_eq!(cfg.api_port, 3000);
        assert!((cfg.severity_small_move - 0.01).abs() < 1e-12);
        assert!((cfg.severity_big_move - 0.10).abs() < 1e-12);
    }

    #[test]
    fn windows_keep_configured_order() {
        let cfg = config_with(&[("LOOKBACK_WINDOWS", "30, 1 ,7")]).unwrap();
        assert_eq!(cfg.lookback_windows, vec![30, 1, 7]);
    }

    #[test]
    fn zero_or_duplicate_window_is_rejected() {
        assert!(matches!(config_with(&[("LOOKBACK_WINDOWS", "1,0")]), Err(AppError::Config(_))));
        assert!(matches!(config_with(&[("LOOKBACK_WINDOWS", "7,7")]), Err(AppError::Config(_))));
        assert!(matches!(config_with(&[("LOOKBACK_WINDOWS", "x")]), Err(AppError::Config(_))));
        assert!(matches!(config_with(&[("LOOKBACK_WINDOWS", " , ")]), Err(AppError::Config(_))));
    }

    #[test]
    fn bad_port_is_a_config_error() {
        assert!(matches!(config_with(&[("API_PORT", "70000")]), Err(AppError::Config(_))));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = config_with(&[("SEVERITY_SMALL_MOVE", "0.2"), ("SEVERITY_BIG_MOVE", "0.1")]);
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn glyph_overrides_need_all_five_buckets() {
        let cfg = config_with(&[("SEVERITY_GLYPHS", "vv, v, , ^, ^^")]).unwrap();
        let glyphs = cfg.severity_glyphs.unwrap();
        assert_eq!(glyphs[0], "vv");
        assert_eq!(glyphs[2], "");
        assert_eq!(glyphs[4], "^^");
        assert!(config_with(&[]).unwrap().severity_glyphs.is_none());
        assert!(matches!(config_with(&[("SEVERITY_GLYPHS", "a,b,c")]), Err(AppError::Config(_))));
    }

    #[test]
    fn symbols_are_normalized() {
        assert_eq!(parse_symbols(" aapl, ,msft "), vec!["AAPL", "MSFT"]);
    }
}
