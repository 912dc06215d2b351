//! Capture capabilities for a terminal host.
//!
//! - `TypedRecognizer`: the next line of text input is the transcript
//! - `RecorderRecognizer`: records one utterance with an external command
//!   (SoX `rec` with silence detection by default) and transcribes it with
//!   local Whisper
//!
//! Both push their signals back through the session handle, tagged with
//! the attempt number they were started with.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::controller::SessionHandle;
use crate::domain::CaptureEventKind;

use super::whisper::WhisperTranscriber;
use super::Recognizer;

/// Placeholder in the record command replaced by the WAV output path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Treats each line of text input as one spoken utterance
pub struct TypedRecognizer<R> {
    lines: Arc<Mutex<Lines<R>>>,
    events: SessionHandle,
    task: Option<JoinHandle<()>>,
}

impl TypedRecognizer<BufReader<Stdin>> {
    /// Read utterances from standard input
    pub fn stdin(events: SessionHandle) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), events)
    }
}

impl<R> TypedRecognizer<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, events: SessionHandle) -> Self {
        Self {
            lines: Arc::new(Mutex::new(reader.lines())),
            events,
            task: None,
        }
    }
}

impl<R> Recognizer for TypedRecognizer<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        "typed"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn start(&mut self, attempt: u64) -> Result<()> {
        if let Some(previous) = self.task.take() {
            previous.abort();
        }

        let lines = self.lines.clone();
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            events.capture(attempt, CaptureEventKind::Started);

            let next = lines.lock().await.next_line().await;
            match next {
                Ok(Some(line)) => {
                    events.capture(attempt, CaptureEventKind::Transcript(line));
                }
                Ok(None) => {
                    debug!(attempt, "Text input closed");
                    events.input_closed();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Failed to read text input");
                    events.capture(attempt, CaptureEventKind::Error("audio-capture".to_string()));
                }
            }

            events.capture(attempt, CaptureEventKind::Ended);
        }));

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let task = self.task.take().context("No capture in progress")?;
        task.abort();
        Ok(())
    }
}

/// Settings for recorder-based capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    /// Program and arguments; `{output}` is replaced by the WAV path
    pub record_command: Vec<String>,

    /// Whisper CLI binary
    pub whisper_binary: String,

    /// Whisper model name
    pub whisper_model: String,

    /// Recognition language tag
    pub language: String,
}

/// SoX `rec`, mono 16 kHz, ending after 1.5 s of silence
pub fn default_record_command() -> Vec<String> {
    [
        "rec",
        "-q",
        "-c",
        "1",
        "-r",
        "16000",
        OUTPUT_PLACEHOLDER,
        "silence",
        "1",
        "0.1",
        "1%",
        "1",
        "1.5",
        "1%",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            record_command: default_record_command(),
            whisper_binary: "whisper".to_string(),
            whisper_model: "base".to_string(),
            language: "en-US".to_string(),
        }
    }
}

impl RecorderSettings {
    /// Record command with the output path filled in
    pub fn record_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.record_command
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }
}

/// Records one utterance, then transcribes it
pub struct RecorderRecognizer {
    settings: RecorderSettings,
    events: SessionHandle,
    supported: bool,
    stop_tx: Option<oneshot::Sender<()>>,
}

/// Check whether a program can be spawned. The child is killed on drop
/// without waiting for it.
fn can_spawn(program: &str) -> bool {
    Command::new(program)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .is_ok()
}

impl RecorderRecognizer {
    /// Create a recognizer; support is checked once here (must run inside
    /// a tokio runtime)
    pub fn new(settings: RecorderSettings, events: SessionHandle) -> Self {
        let supported = settings
            .record_command
            .first()
            .map(|program| can_spawn(program))
            .unwrap_or(false)
            && can_spawn(&settings.whisper_binary);

        if !supported {
            debug!(record_command = ?settings.record_command, whisper = %settings.whisper_binary, "Recorder capture unavailable");
        }

        Self {
            settings,
            events,
            supported,
            stop_tx: None,
        }
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }
}

impl Recognizer for RecorderRecognizer {
    fn name(&self) -> &str {
        "recorder"
    }

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self, attempt: u64) -> Result<()> {
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let output = temp_dir.path().join("capture.wav");
        let args = self.settings.record_args(&output);
        let (program, args) = args.split_first().context("Record command is empty")?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn recorder '{}'", program))?;

        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let events = self.events.clone();
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let _temp_dir = temp_dir;
            events.capture(attempt, CaptureEventKind::Started);

            let recorded = tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut stop_rx => None,
            };

            let kind = match recorded {
                None => {
                    if let Err(e) = child.kill().await {
                        debug!(attempt, error = %e, "Recorder already exited");
                    }
                    events.capture(attempt, CaptureEventKind::Ended);
                    return;
                }
                Some(Ok(status)) if status.success() => {
                    let whisper = WhisperTranscriber::from_settings(&settings);
                    let transcribed = tokio::select! {
                        result = whisper.transcribe(&output) => Some(result),
                        _ = &mut stop_rx => None,
                    };

                    match transcribed {
                        None => {
                            debug!(attempt, "Transcription dropped on stop");
                            events.capture(attempt, CaptureEventKind::Ended);
                            return;
                        }
                        Some(Ok(result)) if result.text.is_empty() => {
                            CaptureEventKind::Error("no-speech".to_string())
                        }
                        Some(Ok(result)) => {
                            debug!(attempt, seconds = result.seconds, "Transcribed utterance");
                            CaptureEventKind::Transcript(result.text)
                        }
                        Some(Err(e)) => {
                            warn!(attempt, error = %e, "Transcription failed");
                            CaptureEventKind::Error("transcription".to_string())
                        }
                    }
                }
                Some(Ok(status)) => {
                    warn!(attempt, %status, "Recorder exited with failure");
                    CaptureEventKind::Error("audio-capture".to_string())
                }
                Some(Err(e)) => {
                    warn!(attempt, error = %e, "Failed to wait for recorder");
                    CaptureEventKind::Error("audio-capture".to_string())
                }
            };

            events.capture(attempt, kind);
            events.capture(attempt, CaptureEventKind::Ended);
        });

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let stop_tx = self.stop_tx.take().context("No capture in progress")?;
        stop_tx
            .send(())
            .map_err(|_| anyhow::anyhow!("Capture already finished"))
    }
}
