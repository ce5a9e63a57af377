use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use podium_core::{BoardConfig, ColumnMapping, SqliteBoardStore};
use podium_sheet::{PollConfig, SheetCommand, SheetEngine, SheetEvent};

use super::{App, Mode, UiTheme};
use crate::settings_mod::SettingsFocus;

impl App {
    pub(crate) fn new(
        config: BoardConfig,
        done: HashSet<String>,
        store_handle: SqliteBoardStore,
        engine: SheetEngine,
        events: tokio::sync::mpsc::Receiver<SheetEvent>,
        runtime: Arc<tokio::runtime::Runtime>,
        ui_theme: UiTheme,
    ) -> Self {
        let mut app = Self {
            mode: Mode::List,
            config,
            questions: Vec::new(),
            done,
            active: Vec::new(),
            list_index: 0,
            view_index: 0,
            view_scroll: 0,
            last_header: Vec::new(),
            mapping: ColumnMapping::default(),
            engine,
            events,
            store_handle,
            runtime,
            last_tick: Instant::now(),
            fetch_status: "idle".to_string(),
            last_refresh: None,
            status_message: None,
            show_help: false,
            ui_theme,
            settings_focus: SettingsFocus::SourceUrl,
            settings_source: String::new(),
            settings_interval: String::new(),
            settings_title: String::new(),
            settings_qr: String::new(),
            settings_name_col: String::new(),
            settings_question_col: String::new(),
            settings_cursor: 0,
        };
        if app.config.sheet_url.is_empty() {
            app.open_settings();
        } else {
            app.start_polling();
        }
        app
    }

    pub(crate) fn runtime(&self) -> &tokio::runtime::Runtime {
        &self.runtime
    }

    pub(crate) fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.on_event(event);
        }
    }

    pub(crate) fn start_polling(&mut self) {
        let _ = self.engine.send(SheetCommand::StartPolling(PollConfig {
            sheet_url: self.config.sheet_url.clone(),
            interval_secs: self.config.poll_interval_secs,
        }));
    }

    pub(crate) fn request_manual_fetch(&mut self) {
        if self.config.sheet_url.is_empty() {
            self.status_message = Some("No source configured".to_string());
            return;
        }
        let _ = self.engine.send(SheetCommand::FetchNow {
            sheet_url: self.config.sheet_url.clone(),
        });
    }

    pub(crate) fn shutdown(&mut self) {
        let _ = self.engine.send(SheetCommand::StopPolling);
    }
}
