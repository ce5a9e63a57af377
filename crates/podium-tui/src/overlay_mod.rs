use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::{App, centered_rect, set_cursor_at};
use crate::settings_mod::SettingsFocus;
use crate::util_mod::{qr_image_url, truncate_label};

pub(crate) fn render_question_overlay(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let popup = centered_rect(72, 70, area);
    frame.render_widget(Clear, popup);
    let title = format!(" QUESTION {}/{} ", app.view_index + 1, app.active.len());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(app.ui_theme.base)
        .border_style(app.ui_theme.border);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let Some((_, question)) = app.active.get(app.view_index) else {
        frame.render_widget(
            Paragraph::new("No question selected.").style(app.ui_theme.label),
            inner,
        );
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .split(inner);

    let body = Paragraph::new(format!("\"{}\"", question.text))
        .style(app.ui_theme.base)
        .wrap(Wrap { trim: false })
        .scroll((app.view_scroll, 0));
    frame.render_widget(body, rows[0]);

    let attribution = Paragraph::new(Line::from(Span::styled(
        format!("-- {}", question.submitter),
        app.ui_theme.accent,
    )));
    frame.render_widget(attribution, rows[1]);

    let hint = Paragraph::new("n/p next/prev  j/k scroll  d done  esc close")
        .style(app.ui_theme.label);
    frame.render_widget(hint, rows[2]);
}

const SETTINGS_LABEL_COLS: u16 = 18;

pub(crate) fn render_settings_overlay(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let popup = centered_rect(76, 60, area);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" SETTINGS ")
        .style(app.ui_theme.base)
        .border_style(app.ui_theme.border);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let fields = [
        (SettingsFocus::SourceUrl, "Sheet URL"),
        (SettingsFocus::Interval, "Poll interval (s)"),
        (SettingsFocus::Title, "Display title"),
        (SettingsFocus::QrUrl, "QR target URL"),
        (SettingsFocus::NameColumn, "Name column"),
        (SettingsFocus::QuestionColumn, "Question column"),
    ];
    for (row, (focus, label)) in fields.iter().enumerate() {
        let focused = app.settings_focus == *focus;
        let label_style = if focused {
            app.ui_theme.label_focus
        } else {
            app.ui_theme.label
        };
        let line = Line::from(vec![
            Span::styled(
                format!("{:<width$}", label, width = SETTINGS_LABEL_COLS as usize),
                label_style,
            ),
            Span::raw(app.settings_field(*focus).as_str()),
        ]);
        frame.render_widget(Paragraph::new(line).style(app.ui_theme.base), rows[row]);
        if focused {
            let cursor_area = Rect {
                x: rows[row].x.saturating_add(SETTINGS_LABEL_COLS),
                y: rows[row].y,
                width: rows[row].width.saturating_sub(SETTINGS_LABEL_COLS),
                height: 1,
            };
            set_cursor_at(frame, cursor_area, app.settings_field(*focus), app.settings_cursor);
        }
    }

    let qr_line = if app.settings_qr.trim().is_empty() {
        Line::from(Span::styled("QR image: (no target set)", app.ui_theme.label))
    } else {
        Line::from(vec![
            Span::styled("QR image: ", app.ui_theme.label),
            Span::raw(truncate_label(
                &qr_image_url(&app.settings_qr),
                inner.width.saturating_sub(12) as usize,
            )),
        ])
    };
    frame.render_widget(Paragraph::new(qr_line), rows[7]);

    let hint = Paragraph::new("tab next field  enter save  esc cancel").style(app.ui_theme.label);
    frame.render_widget(hint, rows[8]);
}
