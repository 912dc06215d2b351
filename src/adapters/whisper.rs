//! Local Whisper transcription for recorded utterances.
//!
//! The `whisper` CLI writes `<stem>.json` into an output directory; only
//! the text, detected language and last segment end are read back.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::recognizer::RecorderSettings;

/// Text recovered from one recording
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub language: String,
    pub seconds: f64,
}

#[derive(Debug, Deserialize)]
struct WhisperJson {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    end: f64,
}

/// Whisper wants a bare language code (`en`), not a tag (`en-US`)
pub fn whisper_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Runs the whisper CLI with a fixed model and language
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    binary: String,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(binary: &str, model: &str, language_tag: &str) -> Self {
        Self {
            binary: binary.to_string(),
            model: model.to_string(),
            language: whisper_language(language_tag).to_string(),
        }
    }

    pub fn from_settings(settings: &RecorderSettings) -> Self {
        Self::new(
            &settings.whisper_binary,
            &settings.whisper_model,
            &settings.language,
        )
    }

    /// Arguments for transcribing `audio` into `output_dir`
    pub fn args(&self, audio: &Path, output_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![audio.into()];
        for (flag, value) in [
            ("--model", self.model.as_str()),
            ("--language", self.language.as_str()),
            ("--output_format", "json"),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }
        args.push("--output_dir".into());
        args.push(output_dir.into());
        args
    }

    pub async fn transcribe(&self, audio: &Path) -> Result<Transcription> {
        let output_dir = tempfile::tempdir().context("Failed to create temp dir")?;

        let output = Command::new(&self.binary)
            .args(self.args(audio, output_dir.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stem = audio
            .file_stem()
            .context("Audio path has no file name")?
            .to_string_lossy();
        let json_path = output_dir.path().join(format!("{}.json", stem));
        let json = tokio::fs::read_to_string(&json_path)
            .await
            .with_context(|| format!("Missing whisper output {}", json_path.display()))?;

        let transcription = parse_transcription(&json, &self.language)?;
        debug!(
            seconds = transcription.seconds,
            chars = transcription.text.len(),
            "Whisper finished"
        );
        Ok(transcription)
    }
}

/// Read whisper's JSON; segment texts stand in when `text` is absent
fn parse_transcription(json: &str, language: &str) -> Result<Transcription> {
    let parsed: WhisperJson = serde_json::from_str(json).context("Invalid whisper JSON")?;

    let text = match parsed.text {
        Some(text) => text.trim().to_string(),
        None => parsed
            .segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    };

    Ok(Transcription {
        text,
        language: parsed
            .language
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| language.to_string()),
        seconds: parsed.segments.last().map_or(0.0, |s| s.end),
    })
}
