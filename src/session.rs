use std::time::{Duration, Instant};

use crate::config::{Settings, Storage};

/// Seeded at startup and after every chat clear.
pub const WELCOME_MESSAGE: &str =
    "Hi there! Nice to see you 😊 We have a 10% promo code for new customers! \
     Would you like to get one now? 🎁";

/// Shown in place of the reply when the send endpoint fails.
pub const SEND_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Placeholder text for a bot message awaiting the server reply.
pub const PENDING_PLACEHOLDER: &str = "typing...";

/// Maximum characters of the system prompt.
pub const SYSTEM_PROMPT_MAX: usize = 500;

/// Quick-reply labels longer than this are truncated for display.
const QUICK_REPLY_LABEL_MAX: usize = 50;

/// Delay before a selected quick reply auto-submits.
const AUTO_SUBMIT_DELAY: Duration = Duration::from_millis(800);

const ERROR_NOTICE_TTL: Duration = Duration::from_secs(4);
const SUCCESS_NOTICE_TTL: Duration = Duration::from_secs(3);
const SETTINGS_CLOSE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "user:",
            Sender::Bot => "bot:",
        }
    }
}

/// A single message in the chat log. A pending message is a bot placeholder
/// whose text is rewritten in place once the server replies (or fails).
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub pending: bool,
    pub error: bool,
}

impl Message {
    fn user(text: String) -> Self {
        Self { text, sender: Sender::User, pending: false, error: false }
    }

    fn bot(text: String) -> Self {
        Self { text, sender: Sender::Bot, pending: false, error: false }
    }

    fn pending() -> Self {
        Self {
            text: PENDING_PLACEHOLDER.to_string(),
            sender: Sender::Bot,
            pending: true,
            error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReplySource {
    /// Built-in starter prompts; survive dynamic refreshes.
    Static,
    /// Server-suggested prompts; replaced wholesale on each refresh.
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct QuickReply {
    /// Display label, truncated to 50 chars with an ellipsis.
    pub label: String,
    /// Untruncated text, used for submission and the footer hint.
    pub full_text: String,
    pub source: QuickReplySource,
    pub selected: bool,
}

impl QuickReply {
    fn new(text: String, source: QuickReplySource) -> Self {
        let label = if text.chars().count() > QUICK_REPLY_LABEL_MAX {
            let truncated: String = text.chars().take(QUICK_REPLY_LABEL_MAX - 3).collect();
            format!("{}...", truncated)
        } else {
            text.clone()
        };
        Self { label, full_text: text, source, selected: false }
    }
}

/// What the caller must send to the backend after `begin_send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub message: String,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

/// Transient inline notice shown in the settings panel.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    expires_at: Instant,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Width must be between 50-100%")]
    WidthOutOfRange,
    #[error("Height must be between 50-100%")]
    HeightOutOfRange,
    #[error("System prompt must be 500 characters or less")]
    PromptTooLong,
}

#[derive(Debug)]
struct AutoSubmit {
    text: String,
    deadline: Instant,
}

/// Conversation state and quick-reply lifecycle. Owns no I/O: the caller
/// performs network and timer work and feeds results back in, which keeps
/// every transition testable without a terminal or a server.
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub settings: Settings,
    pub quick_replies: Vec<QuickReply>,
    /// At-most-one in-flight send; submits while set are silently dropped.
    pub is_loading: bool,
    storage: Storage,
    notice: Option<Notice>,
    close_settings_at: Option<Instant>,
    auto_submit: Option<AutoSubmit>,
}

impl ChatSession {
    pub fn new(storage: Storage) -> Self {
        let settings = storage.load();
        let mut session = Self {
            messages: Vec::new(),
            settings,
            quick_replies: starter_quick_replies(),
            is_loading: false,
            storage,
            notice: None,
            close_settings_at: None,
            auto_submit: None,
        };
        session.seed_welcome();
        session
    }

    fn seed_welcome(&mut self) {
        self.messages.push(Message::bot(WELCOME_MESSAGE.to_string()));
    }

    /// Start a send. Returns `None` (a silent no-op) for empty or
    /// whitespace-only input, or while another send is in flight. Otherwise
    /// appends the user message plus a pending bot placeholder and hands the
    /// caller the request to execute.
    pub fn begin_send(&mut self, input: &str) -> Option<SendRequest> {
        if self.is_loading {
            return None;
        }
        let message = input.trim();
        if message.is_empty() {
            return None;
        }

        self.is_loading = true;
        self.messages.push(Message::user(message.to_string()));
        self.messages.push(Message::pending());

        let system_prompt = if self.settings.system_prompt.is_empty() {
            None
        } else {
            Some(self.settings.system_prompt.clone())
        };
        Some(SendRequest { message: message.to_string(), system_prompt })
    }

    /// Resolve the in-flight send. The pending placeholder becomes either
    /// the reply or the fixed error message; loading always clears so input
    /// is re-enabled no matter the outcome. Returns true when quick replies
    /// should refresh (success only).
    pub fn complete_send(&mut self, result: anyhow::Result<String>) -> bool {
        self.is_loading = false;

        let Some(pending) = self.messages.iter_mut().find(|m| m.pending) else {
            return false;
        };
        pending.pending = false;
        match result {
            Ok(reply) => {
                pending.text = reply;
                true
            }
            Err(err) => {
                tracing::error!("send failed: {err:#}");
                pending.text = SEND_ERROR_MESSAGE.to_string();
                pending.error = true;
                false
            }
        }
    }

    /// Newline-joined conversation of all non-pending messages, used as
    /// context for suggestion requests.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .filter(|m| !m.pending)
            .map(|m| format!("{} {}", m.sender.label(), m.text))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Replace server-suggested quick replies with a fresh list; built-in
    /// static ones persist across refreshes.
    pub fn apply_quick_replies(&mut self, prompts: Vec<String>) {
        self.quick_replies
            .retain(|qr| qr.source == QuickReplySource::Static);
        self.quick_replies.extend(
            prompts
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| QuickReply::new(p, QuickReplySource::Dynamic)),
        );
    }

    /// Mark one quick reply selected (clearing any prior selection),
    /// schedule the debounced auto-submit, and return the full text to
    /// place in the input field.
    pub fn select_quick_reply(&mut self, index: usize, now: Instant) -> Option<String> {
        if index >= self.quick_replies.len() {
            return None;
        }
        for qr in &mut self.quick_replies {
            qr.selected = false;
        }
        self.quick_replies[index].selected = true;

        let text = self.quick_replies[index].full_text.clone();
        self.auto_submit = Some(AutoSubmit {
            text: text.clone(),
            deadline: now + AUTO_SUBMIT_DELAY,
        });
        Some(text)
    }

    /// Drop any quick-reply selection and its pending auto-submit. Called
    /// when the user starts typing.
    pub fn clear_quick_reply_selection(&mut self) {
        for qr in &mut self.quick_replies {
            qr.selected = false;
        }
        self.auto_submit = None;
    }

    /// If the auto-submit deadline has passed, re-check the preconditions:
    /// the input must still hold exactly the scheduled text and retain
    /// focus. Returns the text to submit when they hold; any mismatch
    /// cancels the schedule (the user moved on).
    pub fn take_due_auto_submit(
        &mut self,
        now: Instant,
        current_input: &str,
        input_focused: bool,
    ) -> Option<String> {
        let auto = self.auto_submit.take()?;
        if now < auto.deadline {
            self.auto_submit = Some(auto);
            return None;
        }
        if input_focused && current_input == auto.text {
            Some(auto.text)
        } else {
            None
        }
    }

    /// Validate and apply new settings. On violation, surfaces a transient
    /// error notice and mutates nothing. On success, persists the new
    /// values, shows a success notice, and schedules the settings panel to
    /// close shortly after.
    pub fn apply_settings(
        &mut self,
        width: u16,
        height: u16,
        system_prompt: &str,
        now: Instant,
    ) -> Result<(), SettingsError> {
        let result = validate_settings(width, height, system_prompt);
        if let Err(ref err) = result {
            self.notice = Some(Notice {
                text: err.to_string(),
                kind: NoticeKind::Error,
                expires_at: now + ERROR_NOTICE_TTL,
            });
            return result;
        }

        self.settings = Settings {
            width_percent: width,
            height_percent: height,
            system_prompt: system_prompt.trim().to_string(),
        };
        if let Err(err) = self.storage.save(&self.settings) {
            tracing::warn!("failed to persist settings: {err:#}");
        }

        self.notice = Some(Notice {
            text: "Settings applied successfully!".to_string(),
            kind: NoticeKind::Success,
            expires_at: now + SUCCESS_NOTICE_TTL,
        });
        self.close_settings_at = Some(now + SETTINGS_CLOSE_DELAY);
        Ok(())
    }

    /// Restore defaults in memory and storage. The caller must have
    /// obtained explicit confirmation first.
    pub fn reset_settings(&mut self) {
        self.settings = Settings::default();
        if let Err(err) = self.storage.reset() {
            tracing::warn!("failed to clear persisted settings: {err:#}");
        }
    }

    /// Empty the log and re-seed the welcome message. The caller must have
    /// obtained explicit confirmation first, and should trigger a
    /// quick-reply refresh afterwards.
    pub fn clear_chat(&mut self) {
        self.messages.clear();
        self.seed_welcome();
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Expire the transient notice; called on every tick.
    pub fn tick(&mut self, now: Instant) {
        if let Some(notice) = &self.notice {
            if now >= notice.expires_at {
                self.notice = None;
            }
        }
    }

    /// True once the post-apply close delay for the settings panel elapsed.
    /// Consumes the schedule.
    pub fn take_settings_close_due(&mut self, now: Instant) -> bool {
        match self.close_settings_at {
            Some(at) if now >= at => {
                self.close_settings_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_settings_close(&mut self) {
        self.close_settings_at = None;
        self.notice = None;
    }
}

fn validate_settings(width: u16, height: u16, system_prompt: &str) -> Result<(), SettingsError> {
    if !(50..=100).contains(&width) {
        return Err(SettingsError::WidthOutOfRange);
    }
    if !(50..=100).contains(&height) {
        return Err(SettingsError::HeightOutOfRange);
    }
    if system_prompt.trim().chars().count() > SYSTEM_PROMPT_MAX {
        return Err(SettingsError::PromptTooLong);
    }
    Ok(())
}

fn starter_quick_replies() -> Vec<QuickReply> {
    [
        "Yes, I'd like a promo code! 🎁",
        "What can you help me with?",
        "Tell me about your products",
    ]
    .into_iter()
    .map(|p| QuickReply::new(p.to_string(), QuickReplySource::Static))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn test_session() -> (ChatSession, TempDir) {
        let dir = tempdir().unwrap();
        let storage = Storage::at(dir.path().join("settings.json"));
        (ChatSession::new(storage), dir)
    }

    #[test]
    fn starts_with_welcome_and_starter_replies() {
        let (session, _dir) = test_session();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].text, WELCOME_MESSAGE);
        assert_eq!(session.messages[0].sender, Sender::Bot);
        assert!(!session.quick_replies.is_empty());
        assert!(session
            .quick_replies
            .iter()
            .all(|qr| qr.source == QuickReplySource::Static));
    }

    #[test]
    fn blank_input_never_appends() {
        let (mut session, _dir) = test_session();
        assert!(session.begin_send("").is_none());
        assert!(session.begin_send("   \n\t").is_none());
        assert_eq!(session.messages.len(), 1); // welcome only
        assert!(!session.is_loading);
    }

    #[test]
    fn submit_appends_user_message_and_pending_placeholder() {
        let (mut session, _dir) = test_session();
        let request = session.begin_send("  hello there  ").unwrap();

        assert_eq!(request.message, "hello there");
        assert_eq!(request.system_prompt, None);
        assert!(session.is_loading);
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].sender, Sender::User);
        assert_eq!(session.messages[1].text, "hello there");
        assert!(session.messages[2].pending);
        assert_eq!(session.messages[2].text, PENDING_PLACEHOLDER);
    }

    #[test]
    fn second_submit_while_pending_is_a_noop() {
        let (mut session, _dir) = test_session();
        session.begin_send("first").unwrap();
        assert!(session.begin_send("second").is_none());
        assert_eq!(session.messages.len(), 3);
    }

    #[test]
    fn system_prompt_rides_along_when_set() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        session.apply_settings(100, 95, "be terse", now).unwrap();

        let request = session.begin_send("hi").unwrap();
        assert_eq!(request.system_prompt.as_deref(), Some("be terse"));
    }

    #[test]
    fn successful_send_resolves_exactly_one_pending_message() {
        let (mut session, _dir) = test_session();
        session.begin_send("hi").unwrap();

        let refresh = session.complete_send(Ok("hello!".to_string()));

        assert!(refresh);
        assert!(!session.is_loading);
        assert!(session.messages.iter().all(|m| !m.pending));
        let bot = session.messages.last().unwrap();
        assert_eq!(bot.text, "hello!");
        assert!(!bot.error);
    }

    #[test]
    fn failed_send_marks_message_errored_and_reenables_input() {
        let (mut session, _dir) = test_session();
        session.begin_send("hi").unwrap();

        let refresh = session.complete_send(Err(anyhow!("connection refused")));

        assert!(!refresh);
        assert!(!session.is_loading); // input re-enabled
        let bot = session.messages.last().unwrap();
        assert!(!bot.pending);
        assert!(bot.error);
        assert_eq!(bot.text, SEND_ERROR_MESSAGE);

        // The session stays usable
        assert!(session.begin_send("again").is_some());
    }

    #[test]
    fn transcript_skips_pending_messages() {
        let (mut session, _dir) = test_session();
        session.begin_send("hello").unwrap();

        let transcript = session.transcript();
        assert!(transcript.contains("user: hello"));
        assert!(transcript.contains(&format!("bot: {}", WELCOME_MESSAGE)));
        assert!(!transcript.contains(PENDING_PLACEHOLDER));
    }

    #[test]
    fn dynamic_replies_replaced_wholesale_static_preserved() {
        let (mut session, _dir) = test_session();
        let static_count = session.quick_replies.len();

        session.apply_quick_replies(vec!["One".into(), "Two".into()]);
        assert_eq!(session.quick_replies.len(), static_count + 2);

        session.apply_quick_replies(vec!["Three".into()]);
        assert_eq!(session.quick_replies.len(), static_count + 1);
        assert_eq!(session.quick_replies.last().unwrap().full_text, "Three");
        assert_eq!(
            session
                .quick_replies
                .iter()
                .filter(|qr| qr.source == QuickReplySource::Static)
                .count(),
            static_count
        );
    }

    #[test]
    fn long_suggestions_truncate_label_but_keep_full_text() {
        let (mut session, _dir) = test_session();
        let long: String = "x".repeat(80);
        session.apply_quick_replies(vec![long.clone()]);

        let qr = session.quick_replies.last().unwrap();
        assert_eq!(qr.label.chars().count(), 50);
        assert!(qr.label.ends_with("..."));
        assert_eq!(qr.full_text, long);

        // Selecting it populates the input with the untruncated text
        let index = session.quick_replies.len() - 1;
        let populated = session.select_quick_reply(index, Instant::now()).unwrap();
        assert_eq!(populated, long);
    }

    #[test]
    fn at_most_one_quick_reply_selected() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        session.select_quick_reply(0, now).unwrap();
        session.select_quick_reply(1, now).unwrap();

        let selected: Vec<_> = session
            .quick_replies
            .iter()
            .filter(|qr| qr.selected)
            .collect();
        assert_eq!(selected.len(), 1);
        assert!(session.quick_replies[1].selected);
    }

    #[test]
    fn auto_submit_fires_when_input_unchanged_and_focused() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        let text = session.select_quick_reply(0, now).unwrap();

        // Not yet due
        assert!(session
            .take_due_auto_submit(now + Duration::from_millis(200), &text, true)
            .is_none());

        let fired = session.take_due_auto_submit(now + Duration::from_millis(900), &text, true);
        assert_eq!(fired.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn auto_submit_cancels_when_input_edited_or_focus_lost() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        let later = now + Duration::from_secs(1);

        let text = session.select_quick_reply(0, now).unwrap();
        assert!(session.take_due_auto_submit(later, "edited text", true).is_none());
        // The schedule was consumed, it must not fire later
        assert!(session.take_due_auto_submit(later, &text, true).is_none());

        session.select_quick_reply(0, now).unwrap();
        assert!(session.take_due_auto_submit(later, &text, false).is_none());
    }

    #[test]
    fn typing_clears_selection_and_schedule() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        let text = session.select_quick_reply(0, now).unwrap();

        session.clear_quick_reply_selection();

        assert!(session.quick_replies.iter().all(|qr| !qr.selected));
        assert!(session
            .take_due_auto_submit(now + Duration::from_secs(1), &text, true)
            .is_none());
    }

    #[test]
    fn invalid_width_rejected_without_mutation() {
        let (mut session, _dir) = test_session();
        let before = session.settings.clone();
        let now = Instant::now();

        let result = session.apply_settings(40, 95, "", now);

        assert_eq!(result, Err(SettingsError::WidthOutOfRange));
        assert_eq!(session.settings, before);
        let notice = session.notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
    }

    #[test]
    fn invalid_height_and_prompt_rejected() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        assert_eq!(
            session.apply_settings(80, 101, "", now),
            Err(SettingsError::HeightOutOfRange)
        );
        let long = "p".repeat(501);
        assert_eq!(
            session.apply_settings(80, 90, &long, now),
            Err(SettingsError::PromptTooLong)
        );
    }

    #[test]
    fn valid_settings_apply_and_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut session = ChatSession::new(Storage::at(path.clone()));
        let now = Instant::now();

        session.apply_settings(80, 90, "hello", now).unwrap();

        assert_eq!(session.settings.width_percent, 80);
        assert_eq!(session.settings.height_percent, 90);
        assert_eq!(session.settings.system_prompt, "hello");
        assert_eq!(session.notice().unwrap().kind, NoticeKind::Success);

        // Persisted values survive a reload
        let reloaded = Storage::at(path).load();
        assert_eq!(reloaded, session.settings);

        // Panel close is scheduled 1s out
        assert!(!session.take_settings_close_due(now));
        assert!(session.take_settings_close_due(now + Duration::from_secs(1)));
    }

    #[test]
    fn notices_expire_on_tick() {
        let (mut session, _dir) = test_session();
        let now = Instant::now();
        session.apply_settings(40, 95, "", now).unwrap_err();
        assert!(session.notice().is_some());

        session.tick(now + Duration::from_secs(3));
        assert!(session.notice().is_some()); // error notice lives 4s

        session.tick(now + Duration::from_secs(4));
        assert!(session.notice().is_none());
    }

    #[test]
    fn reset_settings_restores_defaults_everywhere() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut session = ChatSession::new(Storage::at(path.clone()));
        session
            .apply_settings(60, 70, "custom", Instant::now())
            .unwrap();

        session.reset_settings();

        assert_eq!(session.settings, Settings::default());
        assert_eq!(Storage::at(path).load(), Settings::default());
    }

    #[test]
    fn clear_chat_reseeds_exactly_one_welcome_message() {
        let (mut session, _dir) = test_session();
        session.begin_send("hi").unwrap();
        session.complete_send(Ok("hey".to_string()));

        session.clear_chat();

        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].text, WELCOME_MESSAGE);
    }
}
