use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::answer::Judgment;
use crate::renderer::{GenerateFocus, QuestionDraft};
use crate::state::Phase;
use crate::tui::app::{GenerationJob, SurveyApp};

fn key_label(key: &KeyEvent) -> String {
    if key.modifiers.is_empty() {
        format!("{:?}", key.code)
    } else {
        format!("{:?}+{:?}", key.modifiers, key.code)
    }
}

/// Handles one key press. Returns a generation job when the key started one.
pub fn handle_key(app: &mut SurveyApp, key: KeyEvent) -> Option<GenerationJob> {
    let phase = app.snapshot().phase;
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Text is not logged, only the key kind
    if !matches!(key.code, KeyCode::Char(_)) || ctrl {
        app.logger()
            .log_user_input(&key_label(&key), &format!("{:?}", phase));
    }

    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return None;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return None;
        }
        KeyCode::Char('r') if ctrl => {
            app.reset();
            return None;
        }
        KeyCode::F(2) => {
            app.show_debug = !app.show_debug;
            return None;
        }
        _ => {}
    }

    match phase {
        Phase::RoleSelection => {
            handle_role_key(app, key);
            None
        }
        Phase::Asking => handle_question_key(app, key),
        Phase::Complete => {
            match key.code {
                KeyCode::Char('r') | KeyCode::Char('R') => app.reset(),
                KeyCode::Char('q') | KeyCode::Enter => app.should_quit = true,
                _ => {}
            }
            None
        }
    }
}

fn handle_role_key(app: &mut SurveyApp, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_role_cursor(-1),
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => app.move_role_cursor(1),
        KeyCode::Char(c @ '1'..='3') => {
            app.role_cursor = (c as usize) - ('1' as usize);
            app.select_role();
        }
        KeyCode::Enter => app.select_role(),
        _ => {}
    }
}

fn handle_question_key(app: &mut SurveyApp, key: KeyEvent) -> Option<GenerationJob> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let question = app.snapshot().current_question?;

    if (key.code == KeyCode::Char('b') && ctrl) || key.code == KeyCode::PageUp {
        app.retreat();
        return None;
    }

    let accepts_text = app.draft.as_ref().is_some_and(QuestionDraft::accepts_text);
    let focus = app.draft.as_ref().and_then(QuestionDraft::focus);

    match key.code {
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            if let Some(draft) = app.draft.as_mut() {
                draft.newline(&question);
            }
        }
        KeyCode::Enter => match focus {
            Some(GenerateFocus::Prompt) | Some(GenerateFocus::Reference) => {
                return app.begin_generation();
            }
            _ => {
                // Enter on a write-in option opens its field instead of confirming
                let opened_write_in = match app.draft.as_mut() {
                    Some(draft) if !accepts_text => {
                        draft.select_cursor(&question);
                        draft.accepts_text()
                    }
                    _ => false,
                };
                if !opened_write_in {
                    app.confirm();
                }
            }
        },
        KeyCode::Tab | KeyCode::BackTab => {
            if let Some(draft) = app.draft.as_mut() {
                draft.cycle_focus(&question);
            }
        }
        KeyCode::Up | KeyCode::Left => {
            if let Some(draft) = app.draft.as_mut() {
                draft.move_cursor(&question, -1);
            }
        }
        KeyCode::Down | KeyCode::Right => {
            if let Some(draft) = app.draft.as_mut() {
                draft.move_cursor(&question, 1);
            }
        }
        KeyCode::Backspace => {
            if let Some(draft) = app.draft.as_mut() {
                draft.backspace();
            }
        }
        KeyCode::Char(c) if !ctrl => {
            if let Some(draft) = app.draft.as_mut() {
                if accepts_text {
                    draft.insert_char(c);
                } else if c == ' ' {
                    draft.select_cursor(&question);
                } else if let Some(judgment) = judgment_shortcut(c) {
                    draft.set_judgment(judgment);
                }
            }
        }
        _ => {}
    }
    None
}

/// `1`/`a`, `2`/`b` and `3`/`n` pick a judgment directly.
fn judgment_shortcut(c: char) -> Option<Judgment> {
    match c.to_ascii_lowercase() {
        '1' | 'a' => Some(Judgment::FirstBetter),
        '2' | 'b' => Some(Judgment::SecondBetter),
        '3' | 'n' => Some(Judgment::NoDifference),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/input_tests.rs"]
mod tests;
