use podium_core::{BoardConfig, BoardStore, log_debug};
use podium_sheet::SheetCommand;

use super::{App, Mode, text_char_len};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettingsFocus {
    SourceUrl,
    Interval,
    Title,
    QrUrl,
    NameColumn,
    QuestionColumn,
}

pub(crate) fn settings_focus_next(current: SettingsFocus) -> SettingsFocus {
    match current {
        SettingsFocus::SourceUrl => SettingsFocus::Interval,
        SettingsFocus::Interval => SettingsFocus::Title,
        SettingsFocus::Title => SettingsFocus::QrUrl,
        SettingsFocus::QrUrl => SettingsFocus::NameColumn,
        SettingsFocus::NameColumn => SettingsFocus::QuestionColumn,
        SettingsFocus::QuestionColumn => SettingsFocus::SourceUrl,
    }
}

pub(crate) fn settings_focus_prev(current: SettingsFocus) -> SettingsFocus {
    match current {
        SettingsFocus::SourceUrl => SettingsFocus::QuestionColumn,
        SettingsFocus::Interval => SettingsFocus::SourceUrl,
        SettingsFocus::Title => SettingsFocus::Interval,
        SettingsFocus::QrUrl => SettingsFocus::Title,
        SettingsFocus::NameColumn => SettingsFocus::QrUrl,
        SettingsFocus::QuestionColumn => SettingsFocus::NameColumn,
    }
}

impl App {
    pub(crate) fn open_settings(&mut self) {
        self.settings_source = self.config.sheet_url.clone();
        self.settings_interval = self.config.poll_interval_secs.to_string();
        self.settings_title = self.config.display_title.clone();
        self.settings_qr = self.config.qr_target_url.clone();
        self.settings_name_col = self.config.name_column.clone().unwrap_or_default();
        self.settings_question_col = self.config.question_column.clone().unwrap_or_default();
        self.settings_focus = SettingsFocus::SourceUrl;
        self.settings_cursor = text_char_len(&self.settings_source);
        self.mode = Mode::Settings;
    }

    pub(crate) fn settings_field(&self, focus: SettingsFocus) -> &String {
        match focus {
            SettingsFocus::SourceUrl => &self.settings_source,
            SettingsFocus::Interval => &self.settings_interval,
            SettingsFocus::Title => &self.settings_title,
            SettingsFocus::QrUrl => &self.settings_qr,
            SettingsFocus::NameColumn => &self.settings_name_col,
            SettingsFocus::QuestionColumn => &self.settings_question_col,
        }
    }

    pub(crate) fn settings_field_mut(&mut self) -> &mut String {
        match self.settings_focus {
            SettingsFocus::SourceUrl => &mut self.settings_source,
            SettingsFocus::Interval => &mut self.settings_interval,
            SettingsFocus::Title => &mut self.settings_title,
            SettingsFocus::QrUrl => &mut self.settings_qr,
            SettingsFocus::NameColumn => &mut self.settings_name_col,
            SettingsFocus::QuestionColumn => &mut self.settings_question_col,
        }
    }

    pub(crate) fn settings_move_focus(&mut self, forward: bool) {
        self.settings_focus = if forward {
            settings_focus_next(self.settings_focus)
        } else {
            settings_focus_prev(self.settings_focus)
        };
        self.settings_cursor = text_char_len(self.settings_field(self.settings_focus));
    }

    /// Persists the form and restarts polling with the new configuration.
    /// A non-numeric interval keeps the previous value; clamping and the
    /// share-link rewrite happen in `sanitized`.
    pub(crate) fn save_settings(&mut self) {
        let interval = self
            .settings_interval
            .trim()
            .parse::<u64>()
            .unwrap_or(self.config.poll_interval_secs);
        let config = BoardConfig {
            sheet_url: self.settings_source.clone(),
            poll_interval_secs: interval,
            display_title: self.settings_title.trim().to_string(),
            qr_target_url: self.settings_qr.trim().to_string(),
            name_column: non_empty(&self.settings_name_col),
            question_column: non_empty(&self.settings_question_col),
        }
        .sanitized();

        if let Err(err) = self.runtime().block_on(self.store_handle.save_config(&config)) {
            log_debug(&format!("store save_config failed: {}", err));
            self.status_message = Some(format!("Could not save settings: {}", err));
        } else {
            self.status_message = Some("Settings saved".to_string());
        }
        self.config = config;
        // Force column re-resolution on the next refresh so new overrides
        // apply even when the header row is unchanged.
        self.last_header.clear();
        self.mode = Mode::List;

        if self.config.sheet_url.is_empty() {
            let _ = self.engine.send(SheetCommand::StopPolling);
        } else {
            self.start_polling();
        }
    }

    pub(crate) fn cancel_settings(&mut self) {
        self.mode = Mode::List;
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsFocus, non_empty, settings_focus_next, settings_focus_prev};

    #[test]
    fn focus_cycle_visits_every_field_and_wraps() {
        let mut focus = SettingsFocus::SourceUrl;
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(focus);
            focus = settings_focus_next(focus);
        }
        assert_eq!(focus, SettingsFocus::SourceUrl);
        assert_eq!(seen.len(), 6);
        for pair in seen.windows(2) {
            assert_eq!(settings_focus_prev(pair[1]), pair[0]);
        }
        assert_eq!(
            settings_focus_prev(SettingsFocus::SourceUrl),
            SettingsFocus::QuestionColumn
        );
    }

    #[test]
    fn non_empty_trims_before_deciding() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" Full Name "), Some("Full Name".to_string()));
    }
}
