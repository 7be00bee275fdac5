use anyhow::Result;
use crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use std::time::Instant;

use crate::app::{App, ConfirmAction, FocusPane, InputMode, SettingsField};
use crate::session::SYSTEM_PROMPT_MAX;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.on_tick(Instant::now());
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Confirmation dialog swallows everything else
    if app.confirm.is_some() {
        handle_confirm_key(app, key);
        return;
    }

    if app.show_settings {
        handle_settings_key(app, key);
        return;
    }

    if app.minimized {
        match key.code {
            KeyCode::Char('m') => app.minimized = false,
            KeyCode::Char('q') => app.should_quit = true,
            _ => {}
        }
        return;
    }

    match app.input_mode {
        InputMode::Editing if app.focus == FocusPane::Input => handle_input_editing(app, key),
        _ => handle_normal_mode(app, key),
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_accept(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_cancel(),
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('m') => app.minimized = true,
        KeyCode::Char('s') => app.open_settings(),
        KeyCode::Char('c') => app.request_confirm(ConfirmAction::ClearChat),

        // Focus the input and start typing
        KeyCode::Char('i') | KeyCode::Char('/') => {
            app.focus = FocusPane::Input;
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        // Tab cycles: Input -> QuickReplies -> Messages -> Input
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Input => FocusPane::QuickReplies,
                FocusPane::QuickReplies => FocusPane::Messages,
                FocusPane::Messages => FocusPane::Input,
            };
            if app.focus == FocusPane::Input {
                app.input_mode = InputMode::Editing;
                app.input_cursor = app.input.chars().count();
            }
        }

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::QuickReplies => app.quick_reply_nav_down(),
            _ => app.scroll_messages_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::QuickReplies => app.quick_reply_nav_up(),
            _ => app.scroll_messages_up(),
        },
        KeyCode::Char('g') => app.messages_scroll = 0,
        KeyCode::Char('G') => app.scroll_messages_to_bottom(),

        // Pick the highlighted quick reply
        KeyCode::Enter => {
            if app.focus == FocusPane::QuickReplies {
                if let Some(index) = app.quick_reply_state.selected() {
                    app.select_quick_reply(index, Instant::now());
                }
            }
        }

        _ => {}
    }
}

fn handle_input_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit();
        }
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::QuickReplies;
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                // Any edit drops the quick-reply selection and its auto-submit
                app.session.clear_quick_reply_selection();
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                app.session.clear_quick_reply_selection();
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            app.session.clear_quick_reply_selection();
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        _ => {}
    }
}

fn handle_settings_key(app: &mut App, key: KeyEvent) {
    // Panel-level shortcuts
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('r') => {
                app.request_confirm(ConfirmAction::ResetSettings);
                return;
            }
            KeyCode::Char('l') => {
                app.request_confirm(ConfirmAction::ClearChat);
                return;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Esc => app.close_settings(),
        KeyCode::Enter => app.apply_settings_from_form(Instant::now()),

        KeyCode::Tab | KeyCode::Down => {
            app.settings_form.field = match app.settings_form.field {
                SettingsField::Width => SettingsField::Height,
                SettingsField::Height => SettingsField::Prompt,
                SettingsField::Prompt => SettingsField::Width,
            };
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.settings_form.field = match app.settings_form.field {
                SettingsField::Width => SettingsField::Prompt,
                SettingsField::Height => SettingsField::Width,
                SettingsField::Prompt => SettingsField::Height,
            };
        }

        // Width/height behave like sliders: arrows nudge in steps of 5,
        // clamped to the valid range so the live readout always shows a
        // value that can be applied.
        KeyCode::Left => match app.settings_form.field {
            SettingsField::Width => {
                app.settings_form.width = app.settings_form.width.saturating_sub(5).max(50);
            }
            SettingsField::Height => {
                app.settings_form.height = app.settings_form.height.saturating_sub(5).max(50);
            }
            SettingsField::Prompt => {
                app.settings_form.prompt_cursor = app.settings_form.prompt_cursor.saturating_sub(1);
            }
        },
        KeyCode::Right => match app.settings_form.field {
            SettingsField::Width => {
                app.settings_form.width = (app.settings_form.width + 5).min(100);
            }
            SettingsField::Height => {
                app.settings_form.height = (app.settings_form.height + 5).min(100);
            }
            SettingsField::Prompt => {
                let char_count = app.settings_form.prompt.chars().count();
                app.settings_form.prompt_cursor =
                    (app.settings_form.prompt_cursor + 1).min(char_count);
            }
        },

        KeyCode::Backspace => {
            if app.settings_form.field == SettingsField::Prompt
                && app.settings_form.prompt_cursor > 0
            {
                app.settings_form.prompt_cursor -= 1;
                let byte_pos =
                    char_to_byte_index(&app.settings_form.prompt, app.settings_form.prompt_cursor);
                app.settings_form.prompt.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            if app.settings_form.field == SettingsField::Prompt {
                // Hard stop at the limit, like the original textarea
                if app.settings_form.prompt.chars().count() >= SYSTEM_PROMPT_MAX {
                    return;
                }
                let byte_pos =
                    char_to_byte_index(&app.settings_form.prompt, app.settings_form.prompt_cursor);
                app.settings_form.prompt.insert(byte_pos, c);
                app.settings_form.prompt_cursor += 1;
            }
        }

        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.show_settings || app.confirm.is_some() || app.minimized {
        return;
    }

    let x = mouse.column;
    let y = mouse.row;

    let in_messages = app
        .messages_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_quick_replies = app
        .quick_replies_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);
    let in_input = app
        .input_area
        .map(|r| point_in_rect(x, y, r))
        .unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_quick_replies {
                app.quick_reply_nav_down();
            } else {
                app.scroll_messages_down();
                app.scroll_messages_down();
                app.scroll_messages_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_quick_replies {
                app.quick_reply_nav_up();
            } else {
                app.scroll_messages_up();
                app.scroll_messages_up();
                app.scroll_messages_up();
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(area) = app.quick_replies_area.filter(|r| point_in_rect(x, y, *r)) {
                // Rows inside the bordered list map to indices once the
                // list's scroll offset is added back in
                let index =
                    app.quick_reply_state.offset() + y.saturating_sub(area.y + 1) as usize;
                if index < app.session.quick_replies.len() {
                    app.select_quick_reply(index, Instant::now());
                }
            } else if in_input {
                app.focus = FocusPane::Input;
                app.input_mode = InputMode::Editing;
                app.input_cursor = app.input.chars().count();
            } else if in_messages {
                app.focus = FocusPane::Messages;
                app.input_mode = InputMode::Normal;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatApi;
    use crate::config::Storage;
    use crate::session::ChatSession;
    use tempfile::tempdir;

    fn test_app() -> (App, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let session = ChatSession::new(Storage::at(dir.path().join("settings.json")));
        (App::new(ChatApi::new("http://localhost:0"), session), dir)
    }

    fn left_click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn click_on_scrolled_quick_reply_list_picks_the_visible_item() {
        let (mut app, _dir) = test_app();
        app.session.apply_quick_replies(
            (0..5).map(|i| format!("suggestion {i}")).collect(),
        );
        app.quick_replies_area = Some(Rect::new(0, 10, 40, 6));
        *app.quick_reply_state.offset_mut() = 2;

        // Top visible row is the item at the scroll offset
        handle_mouse(&mut app, left_click(5, 11));

        let selected: Vec<usize> = app
            .session
            .quick_replies
            .iter()
            .enumerate()
            .filter(|(_, qr)| qr.selected)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(selected, vec![2]);
        assert_eq!(app.input, app.session.quick_replies[2].full_text);
    }

    #[test]
    fn click_past_the_last_quick_reply_is_ignored() {
        let (mut app, _dir) = test_app();
        app.quick_replies_area = Some(Rect::new(0, 10, 40, 6));

        handle_mouse(&mut app, left_click(5, 14));

        assert!(app.session.quick_replies.iter().all(|qr| !qr.selected));
    }
}
