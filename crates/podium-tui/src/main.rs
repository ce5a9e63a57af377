use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use podium_core::{BoardConfig, BoardStore, ColumnMapping, Question, SqliteBoardStore};
use podium_sheet::{SheetEngine, SheetEvent};

mod app_lifecycle_mod;
mod board_state_mod;
mod input_mod;
mod overlay_mod;
mod settings_mod;
mod sheet_events_mod;
mod ui_theme_mod;
mod util_mod;

use crate::overlay_mod::{render_question_overlay, render_settings_overlay};
use crate::settings_mod::SettingsFocus;
use crate::ui_theme_mod::{UiTheme, load_ui_theme};
use crate::util_mod::{preview_text, truncate_label};

const TICK_RATE: Duration = Duration::from_millis(200);
const PREVIEW_MAX_COLS: usize = 100;
const SUBMITTER_COL_WIDTH: u16 = 20;

/// Live question board for town-hall style events: polls a spreadsheet's
/// CSV export, lists the open questions, and lets the operator walk through
/// them and mark them done.
#[derive(Parser)]
#[command(name = "podium", version)]
struct Cli {
    /// Path to the state database.
    #[arg(long, default_value = "podium.db")]
    db: String,
    /// Sheet CSV export URL, used to seed the configuration when none is
    /// stored yet.
    #[arg(long)]
    source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    List,
    View,
    Settings,
}

struct App {
    mode: Mode,
    config: BoardConfig,
    questions: Vec<Question>,
    done: HashSet<String>,
    active: Vec<(usize, Question)>,
    list_index: usize,
    view_index: usize,
    view_scroll: u16,
    last_header: Vec<String>,
    mapping: ColumnMapping,
    engine: SheetEngine,
    events: tokio::sync::mpsc::Receiver<SheetEvent>,
    store_handle: SqliteBoardStore,
    runtime: Arc<tokio::runtime::Runtime>,
    last_tick: Instant,
    fetch_status: String,
    last_refresh: Option<DateTime<Local>>,
    status_message: Option<String>,
    show_help: bool,
    ui_theme: UiTheme,
    settings_focus: SettingsFocus,
    settings_source: String,
    settings_interval: String,
    settings_title: String,
    settings_qr: String,
    settings_name_col: String,
    settings_question_col: String,
    settings_cursor: usize,
}

fn next_index(current: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (current + 1) % len }
}

fn prev_index(current: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if current == 0 {
        len - 1
    } else {
        current - 1
    }
}

fn text_char_len(text: &str) -> usize {
    text.chars().count()
}

fn clamp_cursor(cursor: usize, text: &str) -> usize {
    cursor.min(text_char_len(text))
}

fn char_to_byte_idx(text: &str, char_idx: usize) -> usize {
    if char_idx == 0 {
        return 0;
    }
    let mut count = 0usize;
    for (byte_idx, _) in text.char_indices() {
        if count == char_idx {
            return byte_idx;
        }
        count += 1;
    }
    text.len()
}

fn remove_char_at(text: &mut String, char_idx: usize) {
    let start = char_to_byte_idx(text, char_idx);
    let end = char_to_byte_idx(text, char_idx + 1);
    if start < end {
        text.replace_range(start..end, "");
    }
}

fn move_cursor_left(text: &str, cursor: &mut usize) {
    let len = text_char_len(text);
    *cursor = (*cursor).min(len);
    if *cursor > 0 {
        *cursor -= 1;
    }
}

fn move_cursor_right(text: &str, cursor: &mut usize) {
    let len = text_char_len(text);
    *cursor = (*cursor).min(len);
    if *cursor < len {
        *cursor += 1;
    }
}

fn apply_input_key(target: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                remove_char_at(target, *cursor - 1);
                *cursor -= 1;
                return true;
            }
        }
        KeyCode::Delete => {
            let len = text_char_len(target);
            if *cursor < len {
                remove_char_at(target, *cursor);
                return true;
            }
        }
        KeyCode::Char(c) => {
            let idx = char_to_byte_idx(target, *cursor);
            target.insert_str(idx, c.encode_utf8(&mut [0; 4]));
            *cursor += 1;
            return true;
        }
        _ => {}
    }
    *cursor = clamp_cursor(*cursor, target);
    false
}

fn cursor_line_col(text: &str, cursor: usize) -> (usize, usize) {
    let mut line = 0usize;
    let mut col = 0usize;
    let mut idx = 0usize;
    let max = clamp_cursor(cursor, text);
    for ch in text.chars() {
        if idx == max {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        idx += 1;
    }
    (line, col)
}

fn set_cursor_at(frame: &mut ratatui::Frame, area: Rect, text: &str, cursor: usize) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let (line, col) = cursor_line_col(text, cursor);
    let max_x = area.width.saturating_sub(1);
    let max_y = area.height.saturating_sub(1);
    let x = area.x + (col as u16).min(max_x);
    let y = area.y + (line as u16).min(max_y);
    frame.set_cursor_position((x, y));
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let rt = Arc::new(tokio::runtime::Runtime::new()?);

    let (store_handle, config, done, engine, events) = rt.block_on(async {
        let store_handle = SqliteBoardStore::connect(&cli.db).await?;
        store_handle.init().await?;
        let config = match store_handle.load_config().await? {
            Some(config) => config,
            None => {
                let mut config = BoardConfig::default();
                if let Some(source) = &cli.source {
                    config.sheet_url = source.clone();
                }
                config.sanitized()
            }
        };
        let done: HashSet<String> = store_handle.load_done().await?.into_iter().collect();
        let (engine, events) = SheetEngine::start();
        Ok::<_, anyhow::Error>((store_handle, config, done, engine, events))
    })?;

    let ui_theme = load_ui_theme();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(config, done, store_handle, engine, events, rt.clone(), ui_theme);
    let res = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Ok(rt) = Arc::try_unwrap(rt) {
        rt.shutdown_timeout(Duration::from_millis(200));
    }
    res
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui(frame, &mut app))?;

        app.drain_events();

        let timeout = TICK_RATE.saturating_sub(app.last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if app.on_key(key) {
                    app.shutdown();
                    return Ok(());
                }
            }
        }

        if app.last_tick.elapsed() >= TICK_RATE {
            app.last_tick = Instant::now();
        }
    }
}

fn ui(frame: &mut ratatui::Frame, app: &mut App) {
    let area = frame.area();
    frame.render_widget(Block::default().style(app.ui_theme.base), area);
    let help_height = if app.show_help { 4 } else { 2 };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(help_height),
        ])
        .split(area);

    render_status_bar(frame, layout[0], app);
    render_question_list(frame, layout[1], app);
    render_help_bar(frame, layout[2], app);

    match app.mode {
        Mode::View => render_question_overlay(frame, area, app),
        Mode::Settings => render_settings_overlay(frame, area, app),
        Mode::List => {}
    }
}

fn render_status_bar(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    spans.push(Span::styled(
        format!(" {} ", app.config.display_title),
        app.ui_theme.title,
    ));
    spans.push(Span::raw(format!(" fetch: {} ", app.fetch_status)));
    spans.push(Span::raw(format!(
        " open: {}/{} ",
        app.active.len(),
        app.questions.len()
    )));
    spans.push(Span::raw(format!(" every {}s ", app.config.poll_interval_secs)));
    if let Some(at) = &app.last_refresh {
        spans.push(Span::raw(format!(" updated {} ", at.format("%H:%M:%S"))));
    }
    if let Some(message) = &app.status_message {
        spans.push(Span::styled(
            format!(" {} ", truncate_label(message, 48)),
            app.ui_theme.warn,
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(app.ui_theme.bar),
        area,
    );
}

fn render_question_list(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" QUESTIONS ")
        .style(app.ui_theme.base)
        .border_style(app.ui_theme.border);

    if app.config.sheet_url.is_empty() {
        let hint = Paragraph::new("No source configured. Press c to set the sheet URL.")
            .style(app.ui_theme.label)
            .block(block);
        frame.render_widget(hint, area);
        return;
    }
    if app.active.is_empty() {
        let hint = Paragraph::new("No open questions.")
            .style(app.ui_theme.label)
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    // Borders plus the header row eat three lines; window the rows so the
    // selection is always visible.
    let rows_visible = (area.height.saturating_sub(3) as usize).max(1);
    let total = app.active.len();
    let start = if app.list_index >= rows_visible {
        app.list_index + 1 - rows_visible
    } else {
        0
    };
    let end = (start + rows_visible).min(total);

    let header = Row::new(vec!["Submitter", "Question"]).style(app.ui_theme.table_header);
    let rows: Vec<Row> = app.active[start..end]
        .iter()
        .enumerate()
        .map(|(idx, (_, question))| {
            let global_idx = start + idx;
            let style = if global_idx == app.list_index {
                app.ui_theme.focus
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(truncate_label(
                    &question.submitter,
                    SUBMITTER_COL_WIDTH as usize,
                )),
                Cell::from(preview_text(&question.text, PREVIEW_MAX_COLS)),
            ])
            .style(style)
        })
        .collect();
    let table = Table::new(
        rows,
        [Constraint::Length(SUBMITTER_COL_WIDTH), Constraint::Min(10)],
    )
    .header(header)
    .block(block)
    .column_spacing(1)
    .style(app.ui_theme.base);

    frame.render_stateful_widget(table, area, &mut TableState::default());
}

fn render_help_bar(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from(
        " q quit  j/k move  enter open  d done  r refresh  c settings  C clear done  ? more ",
    )];
    if app.show_help {
        lines.push(Line::from(
            " expanded: n/p next/prev (wraps)  j/k scroll  d done  esc close ",
        ));
        if !app.config.qr_target_url.is_empty() {
            lines.push(Line::from(format!(
                " submit questions at: {} ",
                truncate_label(&app.config.qr_target_url, 60)
            )));
        }
    }
    frame.render_widget(Paragraph::new(lines).style(app.ui_theme.label), area);
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::layout::Rect;

    use super::{
        apply_input_key, centered_rect, cursor_line_col, next_index, prev_index, remove_char_at,
    };

    #[test]
    fn index_helpers_wrap_and_tolerate_empty() {
        assert_eq!(next_index(2, 3), 0);
        assert_eq!(prev_index(0, 3), 2);
        assert_eq!(next_index(0, 0), 0);
        assert_eq!(prev_index(0, 0), 0);
    }

    #[test]
    fn input_key_edits_at_the_char_cursor() {
        let mut text = "caf".to_string();
        let mut cursor = 3usize;
        assert!(apply_input_key(
            &mut text,
            &mut cursor,
            KeyEvent::new(KeyCode::Char('é'), KeyModifiers::NONE),
        ));
        assert_eq!(text, "café");
        assert_eq!(cursor, 4);

        assert!(apply_input_key(
            &mut text,
            &mut cursor,
            KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE),
        ));
        assert_eq!(text, "caf");
        assert_eq!(cursor, 3);
    }

    #[test]
    fn remove_char_handles_multibyte_boundaries() {
        let mut text = "aéb".to_string();
        remove_char_at(&mut text, 1);
        assert_eq!(text, "ab");
    }

    #[test]
    fn cursor_line_col_counts_chars_not_bytes() {
        assert_eq!(cursor_line_col("café", 4), (0, 4));
        assert_eq!(cursor_line_col("ab\ncd", 4), (1, 1));
    }

    #[test]
    fn centered_rect_stays_inside_the_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(70, 60, area);
        assert!(popup.x >= area.x && popup.y >= area.y);
        assert!(popup.right() <= area.right() && popup.bottom() <= area.bottom());
    }
}
