use podium_core::{BoardStore, Question, active_view, clear_done, log_debug, mark_done};

use super::{App, Mode, next_index, prev_index};

impl App {
    pub(crate) fn selected_question(&self) -> Option<&Question> {
        self.active.get(self.list_index).map(|(_, question)| question)
    }

    pub(crate) fn viewed_question(&self) -> Option<&Question> {
        if self.mode != Mode::View {
            return None;
        }
        self.active.get(self.view_index).map(|(_, question)| question)
    }

    /// Rebuilds the visible queue after a refresh or a done-set mutation.
    /// The expanded view follows its question to the question's new
    /// position, or closes when the question is no longer active.
    pub(crate) fn recompute_active(&mut self) {
        let shown = self.viewed_question().map(|question| question.text.clone());
        self.active = active_view(&self.questions, &self.done);
        self.list_index = self.list_index.min(self.active.len().saturating_sub(1));
        if self.mode == Mode::View {
            match reconciled_view_position(&self.active, shown.as_deref()) {
                Some(position) => self.view_index = position,
                None => self.close_question(),
            }
        }
    }

    pub(crate) fn selection_down(&mut self) {
        if self.list_index + 1 < self.active.len() {
            self.list_index += 1;
        }
    }

    pub(crate) fn selection_up(&mut self) {
        if self.list_index > 0 {
            self.list_index -= 1;
        }
    }

    pub(crate) fn open_selected(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.view_index = self.list_index.min(self.active.len() - 1);
        self.view_scroll = 0;
        self.mode = Mode::View;
    }

    pub(crate) fn close_question(&mut self) {
        self.mode = Mode::List;
        self.view_scroll = 0;
    }

    pub(crate) fn next_question(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.view_index = next_index(self.view_index, self.active.len());
        self.list_index = self.view_index;
        self.view_scroll = 0;
    }

    pub(crate) fn prev_question(&mut self) {
        if self.active.is_empty() {
            return;
        }
        self.view_index = prev_index(self.view_index, self.active.len());
        self.list_index = self.view_index;
        self.view_scroll = 0;
    }

    pub(crate) fn mark_current_done(&mut self) {
        let question = match self.mode {
            Mode::View => self.viewed_question(),
            _ => self.selected_question(),
        };
        let Some(text) = question.map(|question| question.text.clone()) else {
            return;
        };
        if mark_done(&mut self.done, &text) {
            if let Err(err) = self.runtime().block_on(self.store_handle.add_done(&text)) {
                log_debug(&format!("store add_done failed: {}", err));
                self.status_message = Some(format!("Could not persist done mark: {}", err));
            } else {
                self.status_message = Some("Marked done".to_string());
            }
        }
        self.recompute_active();
    }

    pub(crate) fn clear_done_questions(&mut self) {
        clear_done(&mut self.done);
        if let Err(err) = self.runtime().block_on(self.store_handle.clear_done()) {
            log_debug(&format!("store clear_done failed: {}", err));
            self.status_message = Some(format!("Could not clear done list: {}", err));
        } else {
            self.status_message = Some("Done list cleared".to_string());
        }
        self.recompute_active();
    }
}

pub(crate) fn reconciled_view_position(
    active: &[(usize, Question)],
    shown_text: Option<&str>,
) -> Option<usize> {
    let shown = shown_text?;
    active
        .iter()
        .position(|(_, question)| question.text == shown)
}

#[cfg(test)]
mod tests {
    use podium_core::Question;

    use super::reconciled_view_position;
    use crate::{next_index, prev_index};

    fn question(text: &str) -> (usize, Question) {
        (
            0,
            Question {
                submitter: "Alice".to_string(),
                text: text.to_string(),
            },
        )
    }

    #[test]
    fn advance_wraps_around_both_ways() {
        assert_eq!(next_index(2, 3), 0);
        assert_eq!(prev_index(0, 3), 2);
        assert_eq!(next_index(0, 3), 1);
        assert_eq!(prev_index(2, 3), 1);
    }

    #[test]
    fn reconcile_follows_the_shown_question_to_its_new_position() {
        let active = vec![question("first"), question("third")];
        assert_eq!(reconciled_view_position(&active, Some("third")), Some(1));
    }

    #[test]
    fn reconcile_closes_when_the_shown_question_left_the_view() {
        let active = vec![question("first")];
        assert_eq!(reconciled_view_position(&active, Some("second")), None);
        assert_eq!(reconciled_view_position(&active, None), None);
        assert_eq!(reconciled_view_position(&[], Some("first")), None);
    }
}
