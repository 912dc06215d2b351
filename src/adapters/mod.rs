//! Adapter interfaces for the platform collaborators.
//!
//! The session core only talks to the outside world through these traits:
//! - `Recognizer`: speech-to-text capability (push-style, via session events)
//! - `ResponseSource`: the backend that answers a transcript
//! - `SpeechSynthesizer`: text-to-speech capability
//! - `SessionUi`: state display, conversation log and error surface

pub mod backend;
pub mod recognizer;
pub mod synthesizer;
pub mod terminal;
pub mod whisper;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::error::VoiceError;
use crate::core::speech::Utterance;
use crate::domain::{AssistantMessage, Role, SessionState, VoiceProfile};

// Re-export the concrete adapters
pub use backend::HttpResponseSource;
pub use recognizer::{RecorderRecognizer, RecorderSettings, TypedRecognizer};
pub use synthesizer::{CommandSynthesizer, ConsoleSynthesizer, SynthEngine};
pub use terminal::{ConversationLog, ErrorBanner, TerminalUi};
pub use whisper::{Transcription, WhisperTranscriber};

/// Speech-to-text capability.
///
/// `start` and `stop` only issue requests; the outcome of an attempt
/// (started, transcript, error code, ended) is pushed back as
/// `SessionEvent::Capture` tagged with the attempt number.
pub trait Recognizer: Send {
    /// Human-readable recognizer name
    fn name(&self) -> &str;

    /// Whether the host offers recognition at all
    fn is_supported(&self) -> bool;

    /// Begin a single-utterance capture
    fn start(&mut self, attempt: u64) -> Result<()>;

    /// End the current capture without a transcript
    fn stop(&mut self) -> Result<()>;
}

/// Backend that turns a transcript into assistant text
#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Send one transcript; a single attempt, no retry
    async fn send(&self, text: &str) -> Result<AssistantMessage, VoiceError>;
}

/// Text-to-speech capability (a single process-wide device)
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Human-readable engine name
    fn name(&self) -> &str;

    /// Voices currently known; may be empty until loaded
    fn voices(&self) -> Vec<VoiceProfile>;

    /// Re-read the platform voice list, returning how many voices are known
    async fn refresh_voices(&self) -> Result<usize> {
        Ok(self.voices().len())
    }

    /// Interrupt anything currently audible
    fn cancel_all(&self);

    /// Speak one utterance, resolving when playback completes
    async fn speak(&self, utterance: &Utterance) -> Result<()>;
}

/// Presentation collaborator
pub trait SessionUi: Send {
    fn on_state_change(&mut self, state: SessionState);

    /// Append a line to the conversation log
    fn append_message(&mut self, role: Role, text: &str);

    fn show_error(&mut self, message: &str);

    fn hide_error(&mut self);
}
