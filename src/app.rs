use anyhow::{Result, anyhow};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::client::ChatApi;
use crate::config::Settings;
use crate::session::ChatSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Messages,
    QuickReplies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Destructive actions that require explicit confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ClearChat,
    ResetSettings,
}

impl ConfirmAction {
    pub fn prompt(&self) -> &'static str {
        match self {
            ConfirmAction::ClearChat => "Are you sure you want to clear the chat history?",
            ConfirmAction::ResetSettings => "Reset all settings to default values?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Width,
    Height,
    Prompt,
}

/// Working copy of the settings while the panel is open; applied only on an
/// explicit, validated apply.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub width: u16,
    pub height: u16,
    pub prompt: String,
    pub prompt_cursor: usize,
    pub field: SettingsField,
}

impl SettingsForm {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            width: settings.width_percent,
            height: settings.height_percent,
            prompt: settings.system_prompt.clone(),
            prompt_cursor: settings.system_prompt.chars().count(),
            field: SettingsField::Width,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub session: ChatSession,
    pub api: ChatApi,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    // Message input
    pub input: String,
    pub input_cursor: usize,

    // Widget chrome
    pub minimized: bool,
    pub show_settings: bool,
    pub settings_form: SettingsForm,
    pub confirm: Option<ConfirmAction>,

    // Messages pane scroll state
    pub messages_scroll: u16,
    pub messages_height: u16,
    pub messages_width: u16,

    // Quick replies cursor (distinct from the session's "selected" mark)
    pub quick_reply_state: ListState,

    // Animation state, 0-2 for the ellipsis on the pending reply
    pub animation_frame: u8,

    // In-flight network work, polled on the tick
    pub send_task: Option<JoinHandle<Result<String>>>,
    pub suggest_task: Option<JoinHandle<Result<Vec<String>>>>,

    // Panel areas for mouse hit-testing (updated during render)
    pub messages_area: Option<Rect>,
    pub quick_replies_area: Option<Rect>,
    pub input_area: Option<Rect>,
}

impl App {
    pub fn new(api: ChatApi, session: ChatSession) -> Self {
        let settings_form = SettingsForm::from_settings(&session.settings);
        let mut quick_reply_state = ListState::default();
        if !session.quick_replies.is_empty() {
            quick_reply_state.select(Some(0));
        }

        Self {
            should_quit: false,
            session,
            api,
            // The widget opens ready to type, like the original input autofocus
            focus: FocusPane::Input,
            input_mode: InputMode::Editing,

            input: String::new(),
            input_cursor: 0,

            minimized: false,
            show_settings: false,
            settings_form,
            confirm: None,

            messages_scroll: 0,
            messages_height: 0,
            messages_width: 0,

            quick_reply_state,

            animation_frame: 0,

            send_task: None,
            suggest_task: None,

            messages_area: None,
            quick_replies_area: None,
            input_area: None,
        }
    }

    /// True while the message input accepts keystrokes.
    pub fn input_focused(&self) -> bool {
        self.focus == FocusPane::Input
            && self.input_mode == InputMode::Editing
            && !self.show_settings
            && self.confirm.is_none()
            && !self.minimized
    }

    /// Submit whatever is in the input field. Blank input and submits while
    /// a send is in flight are silently dropped by the session.
    pub fn submit(&mut self) {
        let Some(request) = self.session.begin_send(&self.input) else {
            return;
        };
        self.input.clear();
        self.input_cursor = 0;
        self.scroll_messages_to_bottom();

        let api = self.api.clone();
        self.send_task = Some(tokio::spawn(async move { api.send_message(&request).await }));
    }

    /// Kick off a quick-reply refresh from the current transcript. Skipped
    /// while one is already outstanding; refreshes are sequential in
    /// practice (startup, after a send resolves, after clear-chat).
    pub fn spawn_refresh(&mut self) {
        if self.suggest_task.is_some() {
            return;
        }
        let api = self.api.clone();
        let conversation = self.session.transcript();
        self.suggest_task =
            Some(tokio::spawn(async move { api.suggest_prompts(&conversation).await }));
    }

    /// Reap finished background tasks and feed their results into the
    /// session. Called on every tick.
    pub async fn poll_tasks(&mut self) {
        if self.send_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.send_task.take() {
                let result = match task.await {
                    Ok(result) => result,
                    Err(err) => Err(anyhow!("send task panicked: {err}")),
                };
                let refresh = self.session.complete_send(result);
                self.scroll_messages_to_bottom();
                if refresh {
                    self.spawn_refresh();
                }
            }
        }

        if self.suggest_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.suggest_task.take() {
                match task.await {
                    Ok(Ok(prompts)) => {
                        self.session.apply_quick_replies(prompts);
                        self.clamp_quick_reply_cursor();
                    }
                    // Non-fatal: existing replies stay untouched
                    Ok(Err(err)) => tracing::warn!("quick-reply refresh failed: {err:#}"),
                    Err(err) => tracing::warn!("suggest task panicked: {err}"),
                }
            }
        }
    }

    /// Per-tick housekeeping: animation, notice expiry, the deferred
    /// settings-panel close, and the debounced auto-submit.
    pub fn on_tick(&mut self, now: Instant) {
        if self.session.is_loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        self.session.tick(now);

        if self.session.take_settings_close_due(now) {
            self.show_settings = false;
        }

        let focused = self.input_focused();
        if let Some(text) = self.session.take_due_auto_submit(now, &self.input, focused) {
            debug_assert_eq!(text, self.input);
            self.submit();
        }
    }

    pub fn select_quick_reply(&mut self, index: usize, now: Instant) {
        if let Some(text) = self.session.select_quick_reply(index, now) {
            self.quick_reply_state.select(Some(index));
            self.input = text;
            self.input_cursor = self.input.chars().count();
            self.focus = FocusPane::Input;
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn quick_reply_nav_down(&mut self) {
        let len = self.session.quick_replies.len();
        if len > 0 {
            let i = self.quick_reply_state.selected().unwrap_or(0);
            self.quick_reply_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn quick_reply_nav_up(&mut self) {
        let i = self.quick_reply_state.selected().unwrap_or(0);
        self.quick_reply_state.select(Some(i.saturating_sub(1)));
    }

    fn clamp_quick_reply_cursor(&mut self) {
        let len = self.session.quick_replies.len();
        if len == 0 {
            self.quick_reply_state.select(None);
        } else {
            let i = self.quick_reply_state.selected().unwrap_or(0);
            self.quick_reply_state.select(Some(i.min(len - 1)));
        }
    }

    // Messages pane scrolling
    pub fn scroll_messages_down(&mut self) {
        let max = self.total_message_lines().saturating_sub(self.messages_height);
        if self.messages_scroll < max {
            self.messages_scroll = self.messages_scroll.saturating_add(1);
        }
    }

    pub fn scroll_messages_up(&mut self) {
        self.messages_scroll = self.messages_scroll.saturating_sub(1);
    }

    /// Scroll so the newest message (or the pending placeholder) is visible.
    pub fn scroll_messages_to_bottom(&mut self) {
        let total = self.total_message_lines();
        let visible = if self.messages_height > 0 {
            self.messages_height
        } else {
            20
        };
        self.messages_scroll = total.saturating_sub(visible);
    }

    fn total_message_lines(&self) -> u16 {
        // Use actual pane width for wrap calculation, default to 50 if not set
        let wrap_width = if self.messages_width > 0 {
            self.messages_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in &self.session.messages {
            // "user: " prefix counts toward the wrapped width
            let char_count = msg.sender.label().chars().count() + 1 + msg.text.chars().count();
            total += ((char_count / wrap_width) + 1) as u16;
        }
        total
    }

    // Settings panel
    pub fn open_settings(&mut self) {
        self.settings_form = SettingsForm::from_settings(&self.session.settings);
        self.show_settings = true;
    }

    pub fn close_settings(&mut self) {
        self.show_settings = false;
        self.session.cancel_settings_close();
    }

    pub fn apply_settings_from_form(&mut self, now: Instant) {
        // Validation failure surfaces as a notice; nothing else to do here
        let _ = self.session.apply_settings(
            self.settings_form.width,
            self.settings_form.height,
            &self.settings_form.prompt,
            now,
        );
    }

    // Confirm dialog
    pub fn request_confirm(&mut self, action: ConfirmAction) {
        self.confirm = Some(action);
    }

    pub fn confirm_accept(&mut self) {
        match self.confirm.take() {
            Some(ConfirmAction::ClearChat) => {
                self.session.clear_chat();
                self.messages_scroll = 0;
                self.spawn_refresh();
            }
            Some(ConfirmAction::ResetSettings) => {
                self.session.reset_settings();
                self.settings_form = SettingsForm::from_settings(&self.session.settings);
            }
            None => {}
        }
    }

    pub fn confirm_cancel(&mut self) {
        self.confirm = None;
    }
}
