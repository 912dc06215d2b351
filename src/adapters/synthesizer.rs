//! Speech synthesis through local command-line engines.
//!
//! `say` (macOS) and `espeak` are driven as subprocesses with the text
//! piped to stdin. `cancel_all` kills whatever is speaking.

use std::process::Stdio;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::core::speech::Utterance;
use crate::domain::VoiceProfile;

use super::SpeechSynthesizer;

/// Words per minute both engines use at rate 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Supported synthesis commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEngine {
    /// macOS `say`
    Say,

    /// eSpeak / eSpeak NG
    Espeak,
}

impl SynthEngine {
    pub fn program(self) -> &'static str {
        match self {
            Self::Say => "say",
            Self::Espeak => "espeak",
        }
    }

    fn list_voices_args(self) -> &'static [&'static str] {
        match self {
            Self::Say => &["-v", "?"],
            Self::Espeak => &["--voices"],
        }
    }

    /// Engine for the current platform
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Say
        } else {
            Self::Espeak
        }
    }
}

/// Parse `say -v ?` output.
///
/// Lines look like `Daniel              en_GB    # Hello, my name is Daniel.`;
/// names may contain spaces.
pub fn parse_say_voices(output: &str) -> Vec<VoiceProfile> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, lang) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || lang.is_empty() {
                return None;
            }
            Some(VoiceProfile::new(name, lang))
        })
        .collect()
}

/// Parse `espeak --voices` output.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other`. The voice is
/// addressed by its language code; the gender column is folded into the
/// display name so the name heuristic can see it.
pub fn parse_espeak_voices(output: &str) -> Vec<VoiceProfile> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let age_gender = columns.next()?;
            let voice_name = columns.next()?.replace('_', " ");

            let name = match age_gender.rsplit('/').next() {
                Some("M") => format!("{} Male", voice_name),
                Some("F") => format!("{} Female", voice_name),
                _ => voice_name,
            };

            Some(VoiceProfile::new(name, lang).with_id(lang))
        })
        .collect()
}

/// Synthesizer backed by `say` or `espeak`
pub struct CommandSynthesizer {
    engine: SynthEngine,
    voices: Mutex<Vec<VoiceProfile>>,
    cancel: Notify,
}

impl CommandSynthesizer {
    /// Create a synthesizer; voices stay empty until `refresh_voices`
    pub fn new(engine: SynthEngine) -> Self {
        Self {
            engine,
            voices: Mutex::new(Vec::new()),
            cancel: Notify::new(),
        }
    }

    pub fn engine(&self) -> SynthEngine {
        self.engine
    }

    /// Command-line arguments for one utterance (text goes to stdin)
    pub fn speak_args(&self, utterance: &Utterance) -> Vec<String> {
        let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate).round() as u32;
        let mut args = Vec::new();

        match self.engine {
            SynthEngine::Say => {
                if let Some(voice) = &utterance.voice {
                    args.extend(["-v".to_string(), voice.id.clone()]);
                }
                args.extend([
                    "-r".to_string(),
                    words_per_minute.to_string(),
                    "-f".to_string(),
                    "-".to_string(),
                ]);
            }
            SynthEngine::Espeak => {
                if let Some(voice) = &utterance.voice {
                    args.extend(["-v".to_string(), voice.id.clone()]);
                }
                let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
                let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;
                args.extend([
                    "-s".to_string(),
                    words_per_minute.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "-a".to_string(),
                    amplitude.to_string(),
                    "--stdin".to_string(),
                ]);
            }
        }

        args
    }

    /// Text written to the engine's stdin
    pub fn speak_input(&self, utterance: &Utterance) -> String {
        match self.engine {
            // `say` has no volume flag; it takes an embedded command instead
            SynthEngine::Say if utterance.volume < 1.0 => {
                format!("[[volm {:.2}]] {}", utterance.volume.max(0.0), utterance.text)
            }
            _ => utterance.text.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        self.engine.program()
    }

    fn voices(&self) -> Vec<VoiceProfile> {
        match self.voices.lock() {
            Ok(voices) => voices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn refresh_voices(&self) -> Result<usize> {
        let program = self.engine.program();
        let output = Command::new(program)
            .args(self.engine.list_voices_args())
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to list voices with {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} voice listing failed: {}", program, stderr);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let voices = match self.engine {
            SynthEngine::Say => parse_say_voices(&stdout),
            SynthEngine::Espeak => parse_espeak_voices(&stdout),
        };
        let count = voices.len();

        match self.voices.lock() {
            Ok(mut cached) => *cached = voices,
            Err(poisoned) => *poisoned.into_inner() = voices,
        }

        info!(engine = program, count, "Loaded synthesis voices");
        Ok(count)
    }

    fn cancel_all(&self) {
        self.cancel.notify_waiters();
    }

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        let program = self.engine.program();
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);

        let mut child = Command::new(program)
            .args(self.speak_args(utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.speak_input(utterance).as_bytes())
                .await
                .with_context(|| format!("Failed to write to {} stdin", program))?;
            // Drop stdin to signal EOF
        }

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = &mut cancelled => None,
        };

        match finished {
            Some(status) => {
                let status = status.with_context(|| format!("Failed to wait for {}", program))?;
                if !status.success() {
                    anyhow::bail!("{} exited with {}", program, status);
                }
                Ok(())
            }
            None => {
                child.kill().await.ok();
                debug!(engine = program, "Utterance interrupted");
                Ok(())
            }
        }
    }
}

/// Prints utterances instead of speaking them
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn name(&self) -> &str {
        "console"
    }

    fn voices(&self) -> Vec<VoiceProfile> {
        vec![VoiceProfile::new("Console", "en-US")]
    }

    fn cancel_all(&self) {}

    async fn speak(&self, utterance: &Utterance) -> Result<()> {
        println!("🔊 {}", utterance.text);
        Ok(())
    }
}
