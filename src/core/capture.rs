//! Single-attempt speech capture.
//!
//! `Ready → Listening → (Completed | Failed | Stopped) → Ready`
//!
//! Each `start` opens a new attempt number. Platform events for any other
//! attempt, or arriving while not listening, are dropped, so one attempt
//! yields at most one outcome.

use tracing::{debug, info, warn};

use crate::adapters::Recognizer;
use crate::domain::{CaptureEvent, CaptureEventKind, Transcript};

use super::error::VoiceError;

/// How a capture attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A transcript arrived
    Completed(Transcript),

    /// The platform reported an error code
    Failed(VoiceError),

    /// Ended without a transcript (user stop, silence, blank result)
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Listening,
}

/// Wraps a recognizer with one-outcome-per-attempt bookkeeping
pub struct CaptureSession {
    recognizer: Box<dyn Recognizer>,
    phase: Phase,
    attempt: u64,
}

impl CaptureSession {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            phase: Phase::Ready,
            attempt: 0,
        }
    }

    /// Whether the host offers recognition
    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    pub fn is_listening(&self) -> bool {
        self.phase == Phase::Listening
    }

    /// Number of the current (or last) attempt
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Ask the platform to begin listening
    pub fn start(&mut self) -> Result<(), VoiceError> {
        if !self.recognizer.is_supported() {
            return Err(VoiceError::UnsupportedCapability);
        }

        if self.is_listening() {
            debug!(attempt = self.attempt, "Capture already listening");
            return Ok(());
        }

        let attempt = self.attempt + 1;
        self.recognizer.start(attempt).map_err(|e| {
            warn!(recognizer = self.recognizer.name(), error = %e, "Recognizer refused to start");
            VoiceError::CaptureStart {
                reason: e.to_string(),
            }
        })?;

        self.attempt = attempt;
        self.phase = Phase::Listening;
        info!(attempt, recognizer = self.recognizer.name(), "Capture started");
        Ok(())
    }

    /// End the attempt without a transcript.
    ///
    /// No-op when not listening. Recognizer failures are logged, never
    /// returned.
    pub fn stop(&mut self) -> Option<CaptureOutcome> {
        if !self.is_listening() {
            debug!("Stop requested while not listening");
            return None;
        }

        if let Err(e) = self.recognizer.stop() {
            warn!(attempt = self.attempt, error = %e, "Error stopping recognition");
        }

        self.phase = Phase::Ready;
        Some(CaptureOutcome::Stopped)
    }

    /// Feed a platform event; returns the attempt's outcome once it settles
    pub fn observe(&mut self, event: &CaptureEvent) -> Option<CaptureOutcome> {
        if event.attempt != self.attempt || !self.is_listening() {
            debug!(
                event_attempt = event.attempt,
                current_attempt = self.attempt,
                kind = ?event.kind,
                "Dropping stale capture event"
            );
            return None;
        }

        let outcome = match &event.kind {
            CaptureEventKind::Started => {
                debug!(attempt = self.attempt, "Platform is listening");
                return None;
            }
            CaptureEventKind::Transcript(text) => match Transcript::new(text) {
                Some(transcript) => CaptureOutcome::Completed(transcript),
                None => CaptureOutcome::Stopped,
            },
            CaptureEventKind::Error(code) => CaptureOutcome::Failed(VoiceError::Recognition {
                code: code.clone(),
            }),
            CaptureEventKind::Ended => CaptureOutcome::Stopped,
        };

        self.phase = Phase::Ready;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        starts: Vec<u64>,
        stops: u32,
    }

    struct FakeRecognizer {
        supported: bool,
        refuse_start: bool,
        fail_stop: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl FakeRecognizer {
        fn new() -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let recognizer = Self {
                supported: true,
                refuse_start: false,
                fail_stop: false,
                calls: calls.clone(),
            };
            (recognizer, calls)
        }
    }

    impl Recognizer for FakeRecognizer {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn start(&mut self, attempt: u64) -> anyhow::Result<()> {
            if self.refuse_start {
                anyhow::bail!("device busy");
            }
            self.calls.lock().unwrap().starts.push(attempt);
            Ok(())
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().stops += 1;
            if self.fail_stop {
                anyhow::bail!("already stopped");
            }
            Ok(())
        }
    }

    fn event(attempt: u64, kind: CaptureEventKind) -> CaptureEvent {
        CaptureEvent::new(attempt, kind)
    }

    #[test]
    fn test_unsupported_fails_fast() {
        let (mut recognizer, calls) = FakeRecognizer::new();
        recognizer.supported = false;
        let mut capture = CaptureSession::new(Box::new(recognizer));

        assert_eq!(capture.start(), Err(VoiceError::UnsupportedCapability));
        assert!(calls.lock().unwrap().starts.is_empty());
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_refused_start_stays_ready() {
        let (mut recognizer, _calls) = FakeRecognizer::new();
        recognizer.refuse_start = true;
        let mut capture = CaptureSession::new(Box::new(recognizer));

        let result = capture.start();
        assert!(matches!(result, Err(VoiceError::CaptureStart { .. })));
        assert!(!capture.is_listening());
        assert_eq!(capture.attempt(), 0);
    }

    #[test]
    fn test_transcript_completes_attempt_once() {
        let (recognizer, calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));

        capture.start().unwrap();
        assert_eq!(calls.lock().unwrap().starts, vec![1]);

        assert_eq!(capture.observe(&event(1, CaptureEventKind::Started)), None);
        let outcome = capture.observe(&event(1, CaptureEventKind::Transcript("hello".into())));
        assert_eq!(
            outcome,
            Some(CaptureOutcome::Completed(Transcript::new("hello").unwrap()))
        );
        assert!(!capture.is_listening());

        // The trailing end signal belongs to a settled attempt
        assert_eq!(capture.observe(&event(1, CaptureEventKind::Ended)), None);
    }

    #[test]
    fn test_error_code_fails_attempt() {
        let (recognizer, _calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));
        capture.start().unwrap();

        let outcome = capture.observe(&event(1, CaptureEventKind::Error("no-speech".into())));
        assert_eq!(
            outcome,
            Some(CaptureOutcome::Failed(VoiceError::Recognition {
                code: "no-speech".to_string()
            }))
        );

        // No transcript after an error
        let late = capture.observe(&event(1, CaptureEventKind::Transcript("late".into())));
        assert_eq!(late, None);
    }

    #[test]
    fn test_no_result_after_stop() {
        let (recognizer, calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));
        capture.start().unwrap();

        assert_eq!(capture.stop(), Some(CaptureOutcome::Stopped));
        assert_eq!(calls.lock().unwrap().stops, 1);

        let late = capture.observe(&event(1, CaptureEventKind::Transcript("late".into())));
        assert_eq!(late, None);
    }

    #[test]
    fn test_stop_when_ready_is_noop() {
        let (recognizer, calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));

        assert_eq!(capture.stop(), None);
        assert_eq!(calls.lock().unwrap().stops, 0);
    }

    #[test]
    fn test_stop_failure_is_swallowed() {
        let (mut recognizer, _calls) = FakeRecognizer::new();
        recognizer.fail_stop = true;
        let mut capture = CaptureSession::new(Box::new(recognizer));
        capture.start().unwrap();

        assert_eq!(capture.stop(), Some(CaptureOutcome::Stopped));
        assert!(!capture.is_listening());
    }

    #[test]
    fn test_stale_attempt_events_dropped() {
        let (recognizer, _calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));

        capture.start().unwrap();
        capture.stop();
        capture.start().unwrap();
        assert_eq!(capture.attempt(), 2);

        // Late end signal from the first attempt must not end the second
        assert_eq!(capture.observe(&event(1, CaptureEventKind::Ended)), None);
        assert!(capture.is_listening());

        let outcome = capture.observe(&event(2, CaptureEventKind::Ended));
        assert_eq!(outcome, Some(CaptureOutcome::Stopped));
    }

    #[test]
    fn test_blank_transcript_is_graceful_end() {
        let (recognizer, _calls) = FakeRecognizer::new();
        let mut capture = CaptureSession::new(Box::new(recognizer));
        capture.start().unwrap();

        let outcome = capture.observe(&event(1, CaptureEventKind::Transcript("   ".into())));
        assert_eq!(outcome, Some(CaptureOutcome::Stopped));
    }
}
