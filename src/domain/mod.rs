//! Domain types for the voice session.
//!
//! This module contains the core data structures:
//! - Session: the single state holder
//! - Messages: transcripts, assistant replies, conversation log entries
//! - Voice: synthesis voice descriptions
//! - Events: typed platform and user signals

pub mod events;
pub mod message;
pub mod session;
pub mod voice;

// Re-export commonly used types
pub use events::{CaptureEvent, CaptureEventKind, SessionEvent};
pub use message::{AssistantMessage, ConversationEntry, Role, Transcript};
pub use session::{Session, SessionState};
pub use voice::{GenderHint, VoiceProfile};
