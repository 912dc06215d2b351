//! Session state for one voice interaction page/process.
//!
//! A Session is a singleton per host process. Exactly one state is active
//! at a time and only the controller moves it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A voice interaction session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier (used in logs only)
    pub id: Uuid,

    /// Current state of the session
    pub state: SessionState,

    /// Message of the user-facing error currently shown, if any
    pub last_error: Option<String>,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Number of turns that reached the backend
    pub turns: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new idle session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            last_error: None,
            started_at: Utc::now(),
            turns: 0,
        }
    }

    /// Move to `next`. Returns false when already there.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }

    /// Remember a user-facing error
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Forget the current error once it is no longer shown
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Check if the session is idle
    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }
}

/// State of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the user to toggle capture
    Idle,

    /// Capture in progress
    Listening,

    /// Transcript sent, waiting for the backend
    Processing,

    /// Assistant reply is being spoken
    Speaking,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionState {
    /// Whether the capture toggle means anything in this state
    pub fn accepts_toggle(self) -> bool {
        matches!(self, Self::Idle | Self::Listening)
    }

    /// Whether a turn is in flight
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Processing | Self::Speaking)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
