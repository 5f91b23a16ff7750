use crossterm::event::KeyCode;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SummaryResponse {
    pub latest_date: Option<String>,
    pub windows: Vec<usize>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRow {
    pub symbol: String,
    pub latest_price: Option<f64>,
    pub changes: Vec<WindowCell>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct WindowCell {
    pub window: usize,
    pub value: Option<f64>,
    pub bucket: Option<String>,
    pub label: Option<String>,
    pub display: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SeriesResponse {
    pub dates: Vec<String>,
    pub columns: Vec<SeriesColumn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeriesColumn {
    pub symbol: String,
    pub adj_close: Vec<Option<f64>>,
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub summary: SummaryResponse,
    pub series: SeriesResponse,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
    /// Comma-separated symbols to request; `None` uses the service default.
    pub symbols: Option<String>,
}

impl AppState {
    pub fn new(base_url: String, symbols: Option<String>) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            summary: SummaryResponse::default(),
            series: SeriesResponse::default(),
            last_refresh: std::time::Instant::now(),
            base_url,
            symbols,
        }
    }

    fn query(&self, force: bool) -> Vec<(&'static str, String)> {
        let mut q = Vec::new();
        if let Some(s) = &self.symbols {
            q.push(("symbols", s.clone()));
        }
        if force {
            q.push(("refresh", "true".to_string()));
        }
        q
    }

    /// Fetch the summary, then the raw series for charting. `force` bypasses the service cache.
    pub async fn refresh(&mut self, client: &reqwest::Client, force: bool) {
        self.last_refresh = std::time::Instant::now();

        match get_json::<SummaryResponse>(client, &format!("{}/summary", self.base_url), &self.query(force)).await {
            Ok(summary) => {
                self.summary = summary;
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(e);
                return;
            }
        }

        // The summary request just populated the cache, so never force here.
        match get_json::<SeriesResponse>(client, &format!("{}/series", self.base_url), &self.query(false)).await {
            Ok(series) => self.series = series,
            Err(e) => self.status = ConnectionStatus::Error(e),
        }
    }

    pub fn column(&self, symbol: &str) -> Option<&SeriesColumn> {
        self.series.columns.iter().find(|c| c.symbol == symbol)
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&'static str, String)],
) -> Result<T, String> {
    let resp = client.get(url).query(query).send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>().await.map_err(|e| e.to_string())
    } else {
        let msg = resp
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        Err(msg)
    }
}

// ---------------------------------------------------------------------------
// Key bindings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Refetch through the service, bypassing its series cache.
    Refetch,
    /// Move the symbol selection by this many rows.
    Step(isize),
    First,
    Last,
}

pub fn action_for(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('r' | 'R') => Some(Action::Refetch),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::Step(1)),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::Step(-1)),
        KeyCode::PageDown => Some(Action::Step(10)),
        KeyCode::PageUp => Some(Action::Step(-10)),
        KeyCode::Home | KeyCode::Char('g') => Some(Action::First),
        KeyCode::End | KeyCode::Char('G') => Some(Action::Last),
        _ => None,
    }
}

/// New selected row for `action` over `len` summary rows, `None` when there are none.
pub fn move_selection(current: Option<usize>, action: Action, len: usize) -> Option<usize> {
    let last = len.checked_sub(1)?;
    let current = current.unwrap_or(0).min(last);
    match action {
        Action::Step(delta) => Some(current.saturating_add_signed(delta).min(last)),
        Action::First => Some(0),
        Action::Last => Some(last),
        Action::Quit | Action::Refetch => Some(current),
    }
}

/// `"5s ago"`, `"3m ago"`.
pub fn format_age(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{secs}s ago")
    } else {
        format!("{}m ago", secs / 60)
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_price(v: Option<f64>) -> String {
    v.map_or("—".to_string(), |p| format!("{:.2}", p))
}

pub fn format_volume(v: f64) -> String {
    if v >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if v >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if v >= 1e3 {
        format!("{:.1}K", v / 1e3)
    } else {
        format!("{:.0}", v)
    }
}

/// `(row index, adjusted close)` points, skipping absent observations.
pub fn close_points(column: &SeriesColumn) -> Vec<(f64, f64)> {
    column
        .adj_close
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect()
}

/// Min and max of the y values, padded so a flat line is still visible.
pub fn y_bounds(points: &[(f64, f64)]) -> [f64; 2] {
    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.01).max(1e-6);
    [lo - pad, hi + pad]
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(action_for(KeyCode::Char('q')), Some(Action::Quit));
        assert_eq!(action_for(KeyCode::Char('R')), Some(Action::Refetch));
        assert_eq!(action_for(KeyCode::Char('k')), Some(Action::Step(-1)));
        assert_eq!(action_for(KeyCode::Char('G')), Some(Action::Last));
        assert_eq!(action_for(KeyCode::Char('x')), None);
    }

    #[test]
    fn selection_stays_inside_the_summary() {
        assert_eq!(move_selection(Some(0), Action::Step(-1), 3), Some(0));
        assert_eq!(move_selection(Some(1), Action::Step(1), 3), Some(2));
        assert_eq!(move_selection(Some(2), Action::Step(10), 3), Some(2));
        assert_eq!(move_selection(Some(9), Action::Refetch, 3), Some(2));
        assert_eq!(move_selection(None, Action::Last, 3), Some(2));
        assert_eq!(move_selection(Some(0), Action::Step(1), 0), None);
    }

    #[test]
    fn age_is_seconds_then_minutes() {
        assert_eq!(format_age(std::time::Duration::from_secs(5)), "5s ago");
        assert_eq!(format_age(std::time::Duration::from_secs(185)), "3m ago");
    }

    #[test]
    fn volume_units() {
        assert_eq!(format_volume(950.0), "950");
        assert_eq!(format_volume(82_488_700.0), "82.5M");
        assert_eq!(format_volume(1_200_000_000.0), "1.2B");
    }

    #[test]
    fn points_skip_gaps_and_bounds_pad_flat_lines() {
        let col = SeriesColumn {
            symbol: "AAPL".to_string(),
            adj_close: vec![Some(100.0), None, Some(100.0)],
            volume: vec![None, None, None],
        };
        let pts = close_points(&col);
        assert_eq!(pts, vec![(0.0, 100.0), (2.0, 100.0)]);
        let [lo, hi] = y_bounds(&pts);
        assert!(lo < 100.0 && hi > 100.0);
        assert_eq!(y_bounds(&[]), [0.0, 1.0]);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("ABCDEFG", 4), "ABC…");
        assert_eq!(truncate("10.0% 🟢", 20), "10.0% 🟢");
    }
}
