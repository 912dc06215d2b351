//! Events delivered to the session controller.
//!
//! Platform callbacks (capture start/end/result/error, voice list changes)
//! and user interaction are all funnelled into one typed channel that the
//! controller subscribes to once.

/// Anything the controller reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User pressed the capture toggle
    Toggle,

    /// Signal from the capture platform
    Capture(CaptureEvent),

    /// The synthesis platform's voice list changed
    VoicesChanged,

    /// No more user input will arrive; finish the current turn, then stop
    InputClosed,

    /// Stop capture and end the session
    Shutdown,
}

/// A capture platform signal tagged with the attempt it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Attempt number handed to the recognizer on start
    pub attempt: u64,

    pub kind: CaptureEventKind,
}

impl CaptureEvent {
    pub fn new(attempt: u64, kind: CaptureEventKind) -> Self {
        Self { attempt, kind }
    }
}

/// Kinds of capture platform signals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEventKind {
    /// Platform began listening
    Started,

    /// A final transcript arrived
    Transcript(String),

    /// Platform reported an error code (`no-speech`, `audio-capture`, ...)
    Error(String),

    /// Platform stopped listening
    Ended,
}
