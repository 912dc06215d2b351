//! Terminal presentation: status line, conversation log, error banner.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ConversationEntry, Role, SessionState};

use super::SessionUi;

/// Default time an error stays visible
pub const ERROR_DISMISS_AFTER: Duration = Duration::from_secs(5);

/// Dismissible error message with a fixed auto-hide delay
#[derive(Debug, Clone)]
pub struct ErrorBanner {
    message: Option<String>,
    shown_at: Option<Instant>,
    dismiss_after: Duration,
}

impl Default for ErrorBanner {
    fn default() -> Self {
        Self::new(ERROR_DISMISS_AFTER)
    }
}

impl ErrorBanner {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            message: None,
            shown_at: None,
            dismiss_after,
        }
    }

    /// Show `message`, restarting the auto-hide delay
    pub fn show(&mut self, message: impl Into<String>, now: Instant) {
        self.message = Some(message.into());
        self.shown_at = Some(now);
    }

    pub fn hide(&mut self) {
        self.message = None;
        self.shown_at = None;
    }

    /// Message still visible at `now`
    pub fn visible(&self, now: Instant) -> Option<&str> {
        let shown_at = self.shown_at?;
        if now.saturating_duration_since(shown_at) >= self.dismiss_after {
            return None;
        }
        self.message.as_deref()
    }

    pub fn dismiss_after(&self) -> Duration {
        self.dismiss_after
    }
}

/// Append-only conversation log
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn append(&mut self, role: Role, text: &str) -> &ConversationEntry {
        self.entries.push(ConversationEntry::new(role, text));
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Prints session activity to stdout
pub struct TerminalUi {
    banner: ErrorBanner,
    log: ConversationLog,
    idle_hint: String,
    state_tx: Option<watch::Sender<SessionState>>,
}

impl TerminalUi {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            banner: ErrorBanner::new(dismiss_after),
            log: ConversationLog::default(),
            idle_hint: "Press Enter to start speaking".to_string(),
            state_tx: None,
        }
    }

    /// Status text shown while idle
    pub fn with_idle_hint(mut self, hint: impl Into<String>) -> Self {
        self.idle_hint = hint.into();
        self
    }

    /// Publish every state change on `tx`
    pub fn with_state_channel(mut self, tx: watch::Sender<SessionState>) -> Self {
        self.state_tx = Some(tx);
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Status line text for `state`
    pub fn status_text(&self, state: SessionState) -> &str {
        match state {
            SessionState::Idle => &self.idle_hint,
            SessionState::Listening => "Listening...",
            SessionState::Processing => "Thinking...",
            SessionState::Speaking => "Speaking...",
        }
    }
}

impl SessionUi for TerminalUi {
    fn on_state_change(&mut self, state: SessionState) {
        let now = Instant::now();
        match self.banner.visible(now) {
            Some(error) => println!("[{}] ⚠️  {}", self.status_text(state), error),
            None => {
                if self.banner.shown_at.is_some() {
                    debug!("Error banner dismissed");
                    self.banner.hide();
                }
                println!("[{}]", self.status_text(state));
            }
        }

        if let Some(tx) = &self.state_tx {
            tx.send_replace(state);
        }
    }

    fn append_message(&mut self, role: Role, text: &str) {
        let entry = self.log.append(role, text);
        println!("{}", entry.render());
    }

    fn show_error(&mut self, message: &str) {
        self.banner.show(message, Instant::now());
        eprintln!("⚠️  {}", message);
    }

    fn hide_error(&mut self) {
        self.banner.hide();
    }
}
