//! Error taxonomy for a voice turn.
//!
//! Every variant renders as the message shown to the user.

use thiserror::Error;

/// Errors surfaced by capture, dispatch and synthesis
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// No recognition capability on this host; capture stays disabled
    #[error("Speech recognition is not supported on this system.")]
    UnsupportedCapability,

    #[error("Error: {code}")]
    Recognition { code: String },

    /// The platform refused to begin listening
    #[error("Failed to start listening. Please try again.")]
    CaptureStart { reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to get response from server (status {status})")]
    Server { status: u16 },

    /// Backend reported an error, or its reply was unusable
    #[error("{message}")]
    Application { message: String },

    /// Logged only, never shown
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),
}

impl VoiceError {
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Only a missing recognition capability ends the session's ability
    /// to capture
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UnsupportedCapability)
    }

    /// Whether this error belongs on the user-facing error surface
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Synthesis(_))
    }
}
