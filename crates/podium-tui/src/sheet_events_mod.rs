use chrono::Local;

use podium_core::{ingest_questions, log_debug, resolve_columns};
use podium_sheet::{SheetEvent, fetch_context_label};

use super::App;

impl App {
    pub(crate) fn on_event(&mut self, event: SheetEvent) {
        match event {
            SheetEvent::FetchStarted { .. } => {
                self.fetch_status = "fetching".to_string();
            }
            SheetEvent::SheetLoaded { context, table } => {
                self.fetch_status = "idle".to_string();
                self.last_refresh = Some(Local::now());
                self.status_message = None;
                log_debug(&format!(
                    "sheet_loaded context={} rows={}",
                    fetch_context_label(context),
                    table.len()
                ));
                self.refresh_from_table(table);
            }
            SheetEvent::FetchFailed { context, reason } => {
                self.fetch_status = "error".to_string();
                self.status_message = Some(format!(
                    "Fetch failed ({}): {}",
                    fetch_context_label(context),
                    reason
                ));
            }
        }
    }

    /// Full rebuild from a freshly parsed table; nothing is diffed. The
    /// column mapping is re-resolved only when the header row changed
    /// (settings-save clears the cached header to force it).
    pub(crate) fn refresh_from_table(&mut self, table: Vec<Vec<String>>) {
        let header = table.first().cloned().unwrap_or_default();
        if header != self.last_header {
            self.mapping = resolve_columns(&header, &self.config.column_prefs());
            self.last_header = header;
        }
        self.questions = ingest_questions(&table, self.mapping);
        self.recompute_active();
    }
}
