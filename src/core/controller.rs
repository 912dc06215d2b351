//! Session controller: the state machine that drives a voice turn.
//!
//! ```text
//! Idle ──toggle──▶ Listening ──transcript──▶ Processing ──reply──▶ Speaking ──drained──▶ Idle
//!   ▲                 │ error / toggle            │ failure
//!   └─────────────────┴───────────────────────────┘
//! ```
//!
//! All inputs arrive on one event channel. While a turn is in flight the
//! controller keeps draining that channel: toggles are ignored, shutdown
//! abandons the turn, anything else is deferred until the turn is back at
//! Idle.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{Recognizer, ResponseSource, SessionUi};
use crate::domain::{
    CaptureEvent, CaptureEventKind, Role, Session, SessionEvent, SessionState, Transcript,
    VoiceProfile,
};

use super::capture::{CaptureOutcome, CaptureSession};
use super::error::VoiceError;
use super::speech::SentenceSpeechQueue;
use super::voice::VoicePreferenceResolver;

/// Receiving end of the session event channel
pub type SessionInbox = mpsc::UnboundedReceiver<SessionEvent>;

/// Cloneable sender for session events
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Send an event; false once the controller has gone away
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn toggle(&self) -> bool {
        self.send(SessionEvent::Toggle)
    }

    /// Report a capture platform signal for `attempt`
    pub fn capture(&self, attempt: u64, kind: CaptureEventKind) -> bool {
        self.send(SessionEvent::Capture(CaptureEvent::new(attempt, kind)))
    }

    pub fn voices_changed(&self) -> bool {
        self.send(SessionEvent::VoicesChanged)
    }

    pub fn input_closed(&self) -> bool {
        self.send(SessionEvent::InputClosed)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }
}

/// Create the session event channel
pub fn session_channel() -> (SessionHandle, SessionInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SessionHandle { tx }, rx)
}

/// Owns the session and wires capture, dispatch and playback together
pub struct SessionController {
    session: Session,
    capture: CaptureSession,
    source: Box<dyn ResponseSource>,
    queue: SentenceSpeechQueue,
    resolver: VoicePreferenceResolver,
    voice: Option<VoiceProfile>,
    ui: Box<dyn SessionUi>,
    inbox: SessionInbox,
    deferred: VecDeque<SessionEvent>,
    toggle_enabled: bool,
    closing: bool,
    finished: bool,
}

impl SessionController {
    /// Build a controller subscribed to `inbox`
    pub fn new(
        recognizer: Box<dyn Recognizer>,
        source: Box<dyn ResponseSource>,
        queue: SentenceSpeechQueue,
        ui: Box<dyn SessionUi>,
        inbox: SessionInbox,
    ) -> Self {
        let resolver = queue.resolver().clone();
        let voice = resolver.resolve(&queue.synthesizer().voices());

        Self {
            session: Session::new(),
            capture: CaptureSession::new(recognizer),
            source,
            queue,
            resolver,
            voice,
            ui,
            inbox,
            deferred: VecDeque::new(),
            toggle_enabled: true,
            closing: false,
            finished: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Currently selected synthesis voice
    pub fn selected_voice(&self) -> Option<&VoiceProfile> {
        self.voice.as_ref()
    }

    /// False once recognition turned out to be unsupported
    pub fn is_toggle_enabled(&self) -> bool {
        self.toggle_enabled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Disable capture up front when the host has no recognizer
    pub fn check_capability(&mut self) {
        if !self.capture.is_supported() {
            self.disable_capture(VoiceError::UnsupportedCapability);
        }
    }

    /// Process events until shutdown or until every sender is dropped
    pub async fn run(mut self) -> Session {
        info!(session_id = %self.session.id, source = self.source.name(), "Voice session started");
        self.check_capability();

        while !self.finished {
            let event = match self.deferred.pop_front() {
                Some(event) => event,
                None => match self.inbox.recv().await {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event).await;
        }

        self.capture.stop();
        info!(
            session_id = %self.session.id,
            turns = self.session.turns,
            "Voice session ended"
        );
        self.session
    }

    /// Handle one event to completion
    pub async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Toggle => self.toggle(),
            SessionEvent::Capture(event) => self.on_capture(event).await,
            SessionEvent::VoicesChanged => self.refresh_voice(),
            SessionEvent::InputClosed => {
                self.closing = true;
                if self.session.is_idle() {
                    self.finished = true;
                }
            }
            SessionEvent::Shutdown => {
                if self.capture.stop().is_some() {
                    debug!("Capture stopped for shutdown");
                }
                if self.session.state == SessionState::Speaking {
                    self.queue.synthesizer().cancel_all();
                }
                self.set_state(SessionState::Idle);
                self.finished = true;
            }
        }
    }

    fn toggle(&mut self) {
        match self.session.state {
            SessionState::Idle => self.start_listening(),
            SessionState::Listening => {
                self.capture.stop();
                self.set_state(SessionState::Idle);
            }
            state => debug!(%state, "Toggle ignored while busy"),
        }
    }

    fn start_listening(&mut self) {
        if !self.toggle_enabled {
            debug!("Toggle ignored: capture disabled");
            return;
        }

        match self.capture.start() {
            Ok(()) => {
                self.ui.hide_error();
                self.session.clear_error();
                self.set_state(SessionState::Listening);
            }
            Err(e) if e.is_terminal() => self.disable_capture(e),
            Err(e) => {
                self.report(&e);
                self.set_state(SessionState::Idle);
            }
        }
    }

    fn disable_capture(&mut self, error: VoiceError) {
        if self.toggle_enabled {
            self.toggle_enabled = false;
            self.report(&error);
        }
    }

    async fn on_capture(&mut self, event: CaptureEvent) {
        if self.session.state != SessionState::Listening {
            debug!(attempt = event.attempt, state = %self.session.state, "Capture event outside listening");
            return;
        }

        match self.capture.observe(&event) {
            Some(CaptureOutcome::Completed(transcript)) => self.run_turn(transcript).await,
            Some(CaptureOutcome::Failed(e)) => {
                self.report(&e);
                self.set_state(SessionState::Idle);
            }
            Some(CaptureOutcome::Stopped) => self.set_state(SessionState::Idle),
            None => {}
        }
    }

    fn refresh_voice(&mut self) {
        let voices = self.queue.synthesizer().voices();
        self.voice = self.resolver.resolve(&voices);
        info!(
            available = voices.len(),
            voice = self.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("none"),
            "Voice list changed"
        );
    }

    /// Dispatch a transcript and speak the reply
    #[instrument(skip_all, fields(session_id = %self.session.id, turn = self.session.turns + 1))]
    async fn run_turn(&mut self, transcript: Transcript) {
        self.set_state(SessionState::Processing);
        self.ui.append_message(Role::User, transcript.as_str());
        self.session.turns += 1;

        let reply = while_busy(
            &mut self.inbox,
            &mut self.deferred,
            SessionState::Processing,
            self.source.send(transcript.as_str()),
        )
        .await;

        let message = match reply {
            None => return,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                self.report(&e);
                self.set_state(SessionState::Idle);
                return;
            }
        };

        self.ui.append_message(Role::Assistant, message.as_str());
        self.set_state(SessionState::Speaking);

        let Some(summary) = while_busy(
            &mut self.inbox,
            &mut self.deferred,
            SessionState::Speaking,
            self.queue.play(&message, self.voice.as_ref()),
        )
        .await
        else {
            return;
        };

        info!(
            utterances = summary.utterances,
            failures = summary.failures,
            "Reply spoken"
        );
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, next: SessionState) {
        let previous = self.session.state;
        if self.session.transition(next) {
            debug!(from = %previous, to = %next, "Session state changed");
            self.ui.on_state_change(next);
        }
        if next == SessionState::Idle && self.closing {
            self.finished = true;
        }
    }

    fn report(&mut self, error: &VoiceError) {
        let message = error.to_string();
        if error.is_terminal() {
            error!(%error, "Capture disabled");
        } else {
            warn!(%error, "Turn failed");
        }
        self.session.record_error(message.clone());
        self.ui.show_error(&message);
    }
}

/// Drive `work` while draining the inbox: toggles are dropped, other
/// events are kept for after the turn. Returns `None` when a shutdown
/// arrived first; the shutdown is left at the front of `deferred`.
async fn while_busy<F: Future>(
    inbox: &mut SessionInbox,
    deferred: &mut VecDeque<SessionEvent>,
    state: SessionState,
    work: F,
) -> Option<F::Output> {
    tokio::pin!(work);
    let mut inbox_open = true;

    loop {
        tokio::select! {
            biased;
            output = &mut work => {
                // Events queued before completion was observed were sent while busy
                if sweep_queued(inbox, deferred, state) {
                    return None;
                }
                return Some(output);
            }
            event = inbox.recv(), if inbox_open => match event {
                Some(event) => {
                    if park(event, deferred, state) {
                        return None;
                    }
                }
                None => inbox_open = false,
            },
        }
    }
}

/// Sort one event received while busy. Returns true for a shutdown.
fn park(event: SessionEvent, deferred: &mut VecDeque<SessionEvent>, state: SessionState) -> bool {
    match event {
        SessionEvent::Toggle => {
            debug!(%state, "Toggle ignored while busy");
            false
        }
        SessionEvent::Shutdown => {
            info!(%state, "Turn abandoned for shutdown");
            deferred.push_front(SessionEvent::Shutdown);
            true
        }
        event => {
            deferred.push_back(event);
            false
        }
    }
}

/// Park everything already waiting in the inbox. Returns true if a
/// shutdown was among it.
fn sweep_queued(
    inbox: &mut SessionInbox,
    deferred: &mut VecDeque<SessionEvent>,
    state: SessionState,
) -> bool {
    let mut shutdown = false;
    while let Ok(event) = inbox.try_recv() {
        shutdown |= park(event, deferred, state);
    }
    shutdown
}
