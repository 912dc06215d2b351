//! parley - voice turn controller
//!
//! Drives one conversational loop: capture an utterance, send the
//! transcript to an assistant backend, then speak the reply one
//! sentence at a time.
//!
//! # Architecture
//!
//! Everything the session reacts to arrives as a [`domain::SessionEvent`]
//! on a single channel, so the controller owns its state without locks:
//! - Idle → Listening → Processing → Speaking → Idle
//! - Toggles are ignored while a request or playback is in flight
//! - Capture events carry an attempt number and stale ones are dropped
//!
//! # Modules
//!
//! - `adapters`: Recognizers, synthesizers, HTTP backend, terminal UI
//! - `core`: Session controller, capture session, speech queue, voice selection
//! - `domain`: Data structures (Session, messages, voices, events)
//! - `config`: YAML configuration with env overrides
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Type turns, hear replies
//! parley talk
//!
//! # Microphone capture transcribed with Whisper
//! parley talk --capture recorder
//!
//! # One request, no capture
//! parley ask "What's the weather like?"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{
    session_channel, SentenceSpeechQueue, SessionController, SessionHandle, VoiceError,
    VoicePreferenceResolver,
};
pub use domain::{AssistantMessage, Session, SessionEvent, SessionState, Transcript, VoiceProfile};
