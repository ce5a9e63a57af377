use crossterm::event::{KeyCode, KeyEvent};

use super::{App, Mode, apply_input_key, move_cursor_left, move_cursor_right};

impl App {
    /// Returns true when the application should exit.
    pub(crate) fn on_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::List => self.on_key_list(key),
            Mode::View => {
                self.on_key_view(key);
                false
            }
            Mode::Settings => {
                self.on_key_settings(key);
                false
            }
        }
    }

    fn on_key_list(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => self.selection_down(),
            KeyCode::Char('k') | KeyCode::Up => self.selection_up(),
            KeyCode::Enter | KeyCode::Char('o') => self.open_selected(),
            KeyCode::Char('d') => self.mark_current_done(),
            KeyCode::Char('r') => self.request_manual_fetch(),
            KeyCode::Char('c') => self.open_settings(),
            KeyCode::Char('C') => self.clear_done_questions(),
            KeyCode::Char('?') => self.show_help = !self.show_help,
            _ => {}
        }
        false
    }

    fn on_key_view(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.close_question(),
            KeyCode::Char('n') | KeyCode::Char('l') | KeyCode::Right => self.next_question(),
            KeyCode::Char('p') | KeyCode::Char('h') | KeyCode::Left => self.prev_question(),
            KeyCode::Char('j') | KeyCode::Down => {
                self.view_scroll = self.view_scroll.saturating_add(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.view_scroll = self.view_scroll.saturating_sub(1);
            }
            KeyCode::Char('d') => self.mark_current_done(),
            _ => {}
        }
    }

    fn on_key_settings(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.cancel_settings(),
            KeyCode::Enter => self.save_settings(),
            KeyCode::Tab | KeyCode::Down => self.settings_move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.settings_move_focus(false),
            KeyCode::Left => {
                let mut cursor = self.settings_cursor;
                move_cursor_left(self.settings_field_mut(), &mut cursor);
                self.settings_cursor = cursor;
            }
            KeyCode::Right => {
                let mut cursor = self.settings_cursor;
                move_cursor_right(self.settings_field_mut(), &mut cursor);
                self.settings_cursor = cursor;
            }
            _ => {
                let mut cursor = self.settings_cursor;
                apply_input_key(self.settings_field_mut(), &mut cursor, key);
                self.settings_cursor = cursor;
            }
        }
    }
}
