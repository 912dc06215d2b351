//! Sentence-segmented speech output.
//!
//! An assistant message is cut into sentence units at runs of `.`, `!`
//! and `?`. Each unit is normalized and spoken to completion before the
//! next one starts, so at most one utterance is ever audible.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::adapters::SpeechSynthesizer;
use crate::domain::{AssistantMessage, VoiceProfile};

use super::error::VoiceError;
use super::voice::VoicePreferenceResolver;

/// How a message is turned into utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechMode {
    /// One utterance per sentence, terminators collapsed to a single `.`
    Sentences,

    /// One utterance for the whole message, terminators stripped
    WholeMessage,
}

impl Default for SpeechMode {
    fn default() -> Self {
        Self::Sentences
    }
}

/// Rate, pitch and volume applied to every utterance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechParams {
    /// Speaking rate multiplier (default: 1.1)
    #[serde(default = "default_rate")]
    pub rate: f32,

    /// Pitch multiplier (default: 1.0)
    #[serde(default = "default_pitch")]
    pub pitch: f32,

    /// Volume 0.0–1.0 (default: 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_rate() -> f32 {
    1.1
}
fn default_pitch() -> f32 {
    1.0
}
fn default_volume() -> f32 {
    1.0
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
        }
    }
}

/// One synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<VoiceProfile>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Outcome of draining one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Utterances issued
    pub utterances: usize,

    /// Utterances whose synthesis failed
    pub failures: usize,
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split text into sentence units, keeping each unit's terminator run.
///
/// Units with nothing but whitespace and terminators are dropped. Text
/// without terminators yields a single unit.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if !is_terminator(c) {
            continue;
        }
        while let Some(&next) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            current.push(next);
            chars.next();
        }
        push_unit(&mut units, &current);
        current.clear();
    }
    push_unit(&mut units, &current);

    units
}

fn push_unit(units: &mut Vec<String>, raw: &str) {
    if raw.chars().any(|c| !c.is_whitespace() && !is_terminator(c)) {
        units.push(raw.trim().to_string());
    }
}

/// Collapse terminator runs to `.` and whitespace runs to one space
pub fn normalize_sentence(unit: &str) -> String {
    let mut out = String::with_capacity(unit.len());
    let mut in_terminators = false;
    let mut in_space = false;

    for c in unit.trim().chars() {
        if is_terminator(c) {
            if !in_terminators {
                out.push('.');
            }
            in_terminators = true;
            in_space = false;
        } else if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
            in_terminators = false;
        } else {
            out.push(c);
            in_terminators = false;
            in_space = false;
        }
    }

    out
}

/// Remove terminators entirely and collapse whitespace
pub fn strip_terminators(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || is_terminator(c))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Texts to synthesize for `text` under `mode`
pub fn plan_utterances(text: &str, mode: SpeechMode) -> Vec<String> {
    match mode {
        SpeechMode::Sentences => split_sentences(text)
            .iter()
            .map(|unit| normalize_sentence(unit))
            .filter(|unit| !unit.is_empty())
            .collect(),
        SpeechMode::WholeMessage => {
            let stripped = strip_terminators(text);
            if stripped.is_empty() {
                Vec::new()
            } else {
                vec![stripped]
            }
        }
    }
}

/// Plays assistant messages through the synthesizer, one unit at a time.
///
/// `play` takes `&mut self`, so a second message cannot start while a
/// previous one is still draining through the same queue.
pub struct SentenceSpeechQueue {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    resolver: VoicePreferenceResolver,
    params: SpeechParams,
    mode: SpeechMode,
}

impl SentenceSpeechQueue {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        resolver: VoicePreferenceResolver,
        params: SpeechParams,
        mode: SpeechMode,
    ) -> Self {
        Self {
            synthesizer,
            resolver,
            params,
            mode,
        }
    }

    pub fn synthesizer(&self) -> &Arc<dyn SpeechSynthesizer> {
        &self.synthesizer
    }

    pub fn resolver(&self) -> &VoicePreferenceResolver {
        &self.resolver
    }

    pub fn mode(&self) -> SpeechMode {
        self.mode
    }

    pub fn params(&self) -> SpeechParams {
        self.params
    }

    /// Speak `message` to completion.
    ///
    /// `voice` is the caller's current selection; when absent the voice is
    /// resolved from the synthesizer's list at the point of use. A failed
    /// utterance is logged and counts as finished.
    #[instrument(skip_all, fields(mode = ?self.mode, engine = self.synthesizer.name()))]
    pub async fn play(
        &mut self,
        message: &AssistantMessage,
        voice: Option<&VoiceProfile>,
    ) -> PlaybackSummary {
        let texts = plan_utterances(message.as_str(), self.mode);
        let mut voice = voice.cloned();
        let mut summary = PlaybackSummary::default();

        info!(utterances = texts.len(), "Speaking assistant message");

        for (index, text) in texts.into_iter().enumerate() {
            self.synthesizer.cancel_all();

            if voice.is_none() {
                voice = self.resolver.resolve(&self.synthesizer.voices());
            }

            let utterance = Utterance {
                text,
                voice: voice.clone(),
                rate: self.params.rate,
                pitch: self.params.pitch,
                volume: self.params.volume,
            };

            debug!(index, text = %utterance.text, "Speaking utterance");
            summary.utterances += 1;

            if let Err(e) = self.synthesizer.speak(&utterance).await {
                let error = VoiceError::Synthesis(e.to_string());
                warn!(index, %error, "Utterance failed, continuing");
                summary.failures += 1;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_order_and_terminators() {
        let units = split_sentences("Hello there! How are you? Fine.");
        assert_eq!(units, vec!["Hello there!", "How are you?", "Fine."]);
    }

    #[test]
    fn test_split_without_terminators() {
        assert_eq!(split_sentences("  just one thought  "), vec!["just one thought"]);
    }

    #[test]
    fn test_split_drops_empty_units() {
        let units = split_sentences("Wait... !!  ?  Really?!   ");
        assert_eq!(units, vec!["Wait...", "Really?!"]);
        assert!(split_sentences("").is_empty());
        assert!(split_sentences(" ... ?! ").is_empty());
    }

    #[test]
    fn test_normalize_collapses_runs() {
        assert_eq!(normalize_sentence("Really?!"), "Really.");
        assert_eq!(normalize_sentence("  so   much\n space...  "), "so much space.");
        assert_eq!(normalize_sentence("no terminator"), "no terminator");
    }

    #[test]
    fn test_plan_sentences() {
        let plan = plan_utterances("Hello there! How are you? Fine.", SpeechMode::Sentences);
        assert_eq!(plan, vec!["Hello there.", "How are you.", "Fine."]);
    }

    #[test]
    fn test_plan_whole_message() {
        let plan = plan_utterances("Hello there! How are you?  Fine.", SpeechMode::WholeMessage);
        assert_eq!(plan, vec!["Hello there How are you Fine"]);
        assert!(plan_utterances("?!", SpeechMode::WholeMessage).is_empty());
    }

    #[test]
    fn test_never_blank_units() {
        let inputs = [
            "",
            "...",
            "a",
            "a.b.c",
            "  .  a  !  ",
            "Line one.\n\nLine two!\t\t",
            "¿Qué? ¡Sí!",
        ];
        for input in inputs {
            for unit in plan_utterances(input, SpeechMode::Sentences) {
                assert!(!unit.trim().is_empty(), "blank unit from {input:?}");
            }
        }
    }

    #[test]
    fn test_default_params() {
        let params = SpeechParams::default();
        assert_eq!(params.rate, 1.1);
        assert_eq!(params.pitch, 1.0);
        assert_eq!(params.volume, 1.0);
    }
}
