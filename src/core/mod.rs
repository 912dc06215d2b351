//! Core session logic.
//!
//! This module contains:
//! - Error: the voice turn error taxonomy
//! - Voice: synthesis voice selection
//! - Capture: single-attempt speech capture
//! - Speech: sentence segmentation and the playback queue
//! - Controller: the session state machine

pub mod capture;
pub mod controller;
pub mod error;
pub mod speech;
pub mod voice;

// Re-export commonly used types
pub use capture::{CaptureOutcome, CaptureSession};
pub use controller::{session_channel, SessionController, SessionHandle, SessionInbox};
pub use error::VoiceError;
pub use speech::{
    normalize_sentence, plan_utterances, split_sentences, strip_terminators, PlaybackSummary,
    SentenceSpeechQueue, SpeechMode, SpeechParams, Utterance,
};
pub use voice::{VoicePolicy, VoicePreferenceResolver};
