//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use parley::adapters::{Recognizer, ResponseSource, SessionUi, SpeechSynthesizer};
use parley::core::{
    SentenceSpeechQueue, SpeechMode, SpeechParams, Utterance, VoiceError,
    VoicePreferenceResolver,
};
use parley::domain::{AssistantMessage, CaptureEventKind, Role, SessionState, VoiceProfile};
use parley::SessionHandle;

/// Let spawned tasks catch up on the current-thread runtime
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Poll `condition` until it holds, failing the test after a second
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

pub fn reply(text: &str) -> Result<AssistantMessage, VoiceError> {
    Ok(AssistantMessage::new(text).unwrap())
}

pub fn queue(synthesizer: Arc<RecordingSynthesizer>, mode: SpeechMode) -> SentenceSpeechQueue {
    SentenceSpeechQueue::new(
        synthesizer,
        VoicePreferenceResolver::default(),
        SpeechParams::default(),
        mode,
    )
}

/// Pair of notifications for holding an async call open
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecognizerLog {
    pub starts: Vec<u64>,
    pub stops: u32,
}

/// Replays one script of capture signals per started attempt
pub struct ScriptedRecognizer {
    supported: bool,
    scripts: VecDeque<Vec<CaptureEventKind>>,
    events: SessionHandle,
    log: Arc<Mutex<RecognizerLog>>,
}

impl ScriptedRecognizer {
    pub fn new(events: SessionHandle) -> Self {
        Self {
            supported: true,
            scripts: VecDeque::new(),
            events,
            log: Arc::new(Mutex::new(RecognizerLog::default())),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Queue the signals the next attempt will produce
    pub fn script(mut self, kinds: Vec<CaptureEventKind>) -> Self {
        self.scripts.push_back(kinds);
        self
    }

    /// Started, one transcript, ended
    pub fn saying(self, text: &str) -> Self {
        self.script(vec![
            CaptureEventKind::Started,
            CaptureEventKind::Transcript(text.to_string()),
            CaptureEventKind::Ended,
        ])
    }

    pub fn log(&self) -> Arc<Mutex<RecognizerLog>> {
        self.log.clone()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, attempt: u64) -> anyhow::Result<()> {
        self.log.lock().unwrap().starts.push(attempt);
        if let Some(script) = self.scripts.pop_front() {
            for kind in script {
                self.events.capture(attempt, kind);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.log.lock().unwrap().stops += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response source
// ---------------------------------------------------------------------------

/// Answers from a list of canned replies
pub struct FakeSource {
    replies: Mutex<VecDeque<Result<AssistantMessage, VoiceError>>>,
    requests: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<Gate>>,
}

impl FakeSource {
    pub fn replying(replies: Vec<Result<AssistantMessage, VoiceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Hold every request until the gate is released
    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl ResponseSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, text: &str) -> Result<AssistantMessage, VoiceError> {
        self.requests.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VoiceError::application("no scripted reply")))
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Records every utterance instead of speaking it
#[derive(Default)]
pub struct RecordingSynthesizer {
    voices: Mutex<Vec<VoiceProfile>>,
    spoken: Mutex<Vec<Utterance>>,
    cancels: AtomicUsize,
    fail_on: Option<String>,
    gate: Option<Arc<Gate>>,
}

impl RecordingSynthesizer {
    pub fn with_voices(voices: Vec<VoiceProfile>) -> Self {
        Self {
            voices: Mutex::new(voices),
            ..Self::default()
        }
    }

    /// Fail the utterance whose text equals `text`
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Hold every utterance until the gate is released
    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_voices(&self, voices: Vec<VoiceProfile>) {
        *self.voices.lock().unwrap() = voices;
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    fn name(&self) -> &str {
        "recording"
    }

    fn voices(&self) -> Vec<VoiceProfile> {
        self.voices.lock().unwrap().clone()
    }

    fn cancel_all(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    async fn speak(&self, utterance: &Utterance) -> anyhow::Result<()> {
        self.spoken.lock().unwrap().push(utterance.clone());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if self.fail_on.as_deref() == Some(utterance.text.as_str()) {
            anyhow::bail!("synthesis-failed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct UiLog {
    pub states: Vec<SessionState>,
    pub messages: Vec<(Role, String)>,
    pub errors: Vec<String>,
    pub hides: usize,
}

/// Keeps everything the controller shows
pub struct RecordingUi {
    log: Arc<Mutex<UiLog>>,
}

impl RecordingUi {
    pub fn new() -> (Self, Arc<Mutex<UiLog>>) {
        let log = Arc::new(Mutex::new(UiLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl SessionUi for RecordingUi {
    fn on_state_change(&mut self, state: SessionState) {
        self.log.lock().unwrap().states.push(state);
    }

    fn append_message(&mut self, role: Role, text: &str) {
        self.log.lock().unwrap().messages.push((role, text.to_string()));
    }

    fn show_error(&mut self, message: &str) {
        self.log.lock().unwrap().errors.push(message.to_string());
    }

    fn hide_error(&mut self) {
        self.log.lock().unwrap().hides += 1;
    }
}
