mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use tui_app::{
    action_for, close_points, format_age, format_price, format_volume, move_selection, truncate, y_bounds, Action,
    AppState, ConnectionStatus,
};

const AUTO_REFRESH_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let symbols = std::env::var("SYMBOLS").ok().filter(|s| !s.trim().is_empty());

    // Cold cache means a provider round trip per symbol.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url, symbols);

    // Initial fetch before rendering
    app.refresh(&client, false).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(if app.summary.rows.is_empty() { None } else { Some(0) });

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let refresh_every = Duration::from_secs(AUTO_REFRESH_SECS);

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        // Wake at least once a second so the header's fetch age keeps ticking.
        let until_refresh = refresh_every.saturating_sub(app.last_refresh.elapsed());
        let action = if event::poll(until_refresh.min(Duration::from_secs(1)))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => action_for(key.code),
                _ => None,
            }
        } else {
            None
        };

        match action {
            Some(Action::Quit) => return Ok(()),
            Some(Action::Refetch) => app.refresh(client, true).await,
            Some(other) => {
                table_state.select(move_selection(table_state.selected(), other, app.summary.rows.len()));
                continue;
            }
            None if app.last_refresh.elapsed() >= refresh_every => app.refresh(client, false).await,
            None => continue,
        }

        // Symbol count can change across refreshes.
        let len = app.summary.rows.len();
        table_state.select(move_selection(table_state.selected(), Action::Step(0), len));
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let bold_cyan = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![Span::styled(" % Change Dashboard ", bold_cyan)];
    match &app.status {
        ConnectionStatus::Connected => {
            if let Some(date) = &app.summary.latest_date {
                spans.push(Span::styled(format!("close of {date}"), Style::default().fg(Color::White)));
            }
            spans.push(Span::styled(format!("  fetched {}", format_age(app.last_refresh.elapsed())), dim));
        }
        ConnectionStatus::Connecting => {
            spans.push(Span::styled("waiting for service", Style::default().fg(Color::Yellow)));
        }
        ConnectionStatus::Error(e) => {
            let msg = format!("service error: {}", truncate(e, 60));
            spans.push(Span::styled(msg, Style::default().fg(Color::Red)));
        }
    }

    let windows: Vec<String> = app.summary.windows.iter().map(|w| format!("{w}d")).collect();
    let subtitle = format!(
        " {} symbols over {} trading-row windows: {} ",
        app.summary.rows.len(),
        windows.len(),
        windows.join(" ")
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim)
        .title_bottom(Span::styled(subtitle, dim));
    let paragraph = Paragraph::new(Line::from(spans)).block(block);

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, table_state: &mut TableState, area: Rect) {
    // Vertical split: summary table (55%) | charts (45%)
    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_summary_table(f, app, table_state, halves[0]);

    let selected = table_state
        .selected()
        .and_then(|i| app.summary.rows.get(i))
        .map(|r| r.symbol.as_str());
    render_charts(f, app, selected, halves[1]);
}

fn render_summary_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let mut headers = vec!["Symbol".to_string(), "Adjusted Close".to_string()];
    headers.extend(app.summary.windows.iter().map(|w| format!("% Change ({w}d)")));

    let header_cells = headers
        .into_iter()
        .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .summary
        .rows
        .iter()
        .map(|r| {
            let mut cells = vec![
                Cell::from(r.symbol.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format_price(r.latest_price)),
            ];
            cells.extend(r.changes.iter().map(|c| {
                Cell::from(c.display.clone()).style(Style::default().fg(bucket_color(c.bucket.as_deref())))
            }));
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![Constraint::Length(8), Constraint::Length(15)];
    widths.extend(app.summary.windows.iter().map(|_| Constraint::Length(17)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(
                    " PRICE CHANGES ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        )
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    f.render_stateful_widget(table, area, state);
}

fn render_charts(f: &mut Frame, app: &AppState, symbol: Option<&str>, area: Rect) {
    // Horizontal split: adjusted close (60%) | volume (40%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let Some(column) = symbol.and_then(|s| app.column(s)) else {
        let empty = Paragraph::new("no series loaded").block(chart_block(" DAILY ADJUSTED CLOSES "));
        f.render_widget(empty, area);
        return;
    };

    let points = close_points(column);
    let x_max = column.adj_close.len().saturating_sub(1).max(1) as f64;
    let [y_lo, y_hi] = y_bounds(&points);
    let first_date = app.series.dates.first().cloned().unwrap_or_default();
    let last_date = app.series.dates.last().cloned().unwrap_or_default();

    let dataset = Dataset::default()
        .name(column.symbol.clone())
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(chart_block(" DAILY ADJUSTED CLOSES "))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first_date), Span::raw(last_date)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([y_lo, y_hi])
                .labels(vec![Span::raw(format!("{y_lo:.2}")), Span::raw(format!("{y_hi:.2}"))]),
        );
    f.render_widget(chart, halves[0]);

    // Only the most recent bars fit; keep the tail.
    let width = halves[1].width.saturating_sub(2) as usize;
    let volumes: Vec<u64> = column.volume.iter().map(|v| v.unwrap_or(0.0).max(0.0) as u64).collect();
    let tail = &volumes[volumes.len().saturating_sub(width)..];
    let peak = column.volume.iter().flatten().fold(0.0_f64, |a, &b| a.max(b));

    let sparkline = Sparkline::default()
        .block(chart_block(" DAILY VOLUME TRADED ").title_bottom(format!(" peak {} ", format_volume(peak))))
        .style(Style::default().fg(Color::Magenta))
        .data(tail);
    f.render_widget(sparkline, halves[1]);
}

fn chart_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_footer(f: &mut Frame, area: Rect) {
    let key = Style::default().fg(Color::Yellow);
    let mut spans = vec![
        Span::styled(" q", key),
        Span::raw(" quit "),
        Span::styled("r", key),
        Span::raw(" refetch "),
        Span::styled("j/k g/G", key),
        Span::raw(" select   "),
    ];
    // Bucket legend, in the same colors as the table.
    for bucket in ["big_drop", "small_drop", "neutral", "small_rise", "big_rise"] {
        let style = Style::default().fg(bucket_color(Some(bucket)));
        spans.push(Span::styled(format!("■ {} ", bucket.replace('_', " ")), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bucket_color(bucket: Option<&str>) -> Color {
    match bucket {
        Some("big_drop") => Color::Red,
        Some("small_drop") => Color::LightRed,
        Some("neutral") => Color::White,
        Some("small_rise") => Color::LightGreen,
        Some("big_rise") => Color::Green,
        _ => Color::DarkGray,
    }
}
