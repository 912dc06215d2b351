//! Command-line interface for parley.
//!
//! Provides an interactive voice session plus one-shot commands for
//! asking the backend, speaking text and inspecting voices/configuration.

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::adapters::{
    CommandSynthesizer, ConsoleSynthesizer, HttpResponseSource, Recognizer, RecorderRecognizer,
    ResponseSource, SpeechSynthesizer, SynthEngine, TerminalUi, TypedRecognizer,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    session_channel, SentenceSpeechQueue, SessionController, SessionHandle, SpeechMode,
    VoicePreferenceResolver,
};
use crate::domain::{AssistantMessage, SessionState};

/// parley - talk to an assistant backend by voice
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive voice session
    Talk {
        /// How speech is captured
        #[arg(short, long, value_enum, default_value = "typed")]
        capture: CaptureMode,

        #[command(flatten)]
        output: OutputArgs,

        /// Backend base URL (overrides config)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Send one request to the backend and speak the reply
    Ask {
        /// Request text (reads from stdin if not provided)
        text: Option<String>,

        #[command(flatten)]
        output: OutputArgs,

        /// Backend base URL (overrides config)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Speak text through the sentence queue
    Speak {
        /// Text to speak (reads from stdin if not provided)
        text: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List synthesis voices and show which one would be used
    Voices {
        /// Synthesis engine
        #[arg(short, long, value_enum)]
        engine: Option<EngineChoice>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Speech output options shared by several commands
#[derive(clap::Args, Debug, Clone)]
pub struct OutputArgs {
    /// Synthesis engine (platform default if not specified)
    #[arg(short, long, value_enum)]
    pub engine: Option<EngineChoice>,

    /// How replies are split into utterances (config if not specified)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeChoice>,
}

/// Capture backend for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CaptureMode {
    /// Each typed line is one utterance
    Typed,

    /// Record from the microphone and transcribe with Whisper
    Recorder,
}

/// Synthesis engine for CLI (maps to SynthEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineChoice {
    /// macOS `say`
    Say,

    /// eSpeak
    Espeak,

    /// Print utterances instead of speaking
    Console,
}

/// Speech mode for CLI (maps to SpeechMode)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeChoice {
    /// Speak sentence by sentence
    Sentences,

    /// Speak the whole reply at once, punctuation stripped
    WholeMessage,
}

impl From<ModeChoice> for SpeechMode {
    fn from(m: ModeChoice) -> Self {
        match m {
            ModeChoice::Sentences => SpeechMode::Sentences,
            ModeChoice::WholeMessage => SpeechMode::WholeMessage,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Talk {
                capture,
                output,
                endpoint,
            } => talk(capture, output, endpoint).await,
            Commands::Ask {
                text,
                output,
                endpoint,
            } => ask(text, output, endpoint).await,
            Commands::Speak { text, output } => speak(text, output).await,
            Commands::Voices { engine } => list_voices(engine).await,
            Commands::Config => show_config().await,
        }
    }
}

fn build_synthesizer(engine: Option<EngineChoice>) -> Arc<dyn SpeechSynthesizer> {
    match engine {
        Some(EngineChoice::Console) => Arc::new(ConsoleSynthesizer),
        Some(EngineChoice::Say) => Arc::new(CommandSynthesizer::new(SynthEngine::Say)),
        Some(EngineChoice::Espeak) => Arc::new(CommandSynthesizer::new(SynthEngine::Espeak)),
        None => Arc::new(CommandSynthesizer::new(SynthEngine::platform_default())),
    }
}

fn build_queue(
    cfg: &ResolvedConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    mode: Option<ModeChoice>,
) -> SentenceSpeechQueue {
    SentenceSpeechQueue::new(
        synthesizer,
        VoicePreferenceResolver::new(cfg.voice.clone()),
        cfg.speech,
        mode.map(SpeechMode::from).unwrap_or(cfg.speech_mode),
    )
}

fn build_source(cfg: &ResolvedConfig, endpoint: Option<String>) -> HttpResponseSource {
    let base_url = endpoint.unwrap_or_else(|| cfg.backend.base_url.clone());
    HttpResponseSource::new(&base_url, &cfg.backend.path)
}

/// Use the text argument or read it from stdin
fn text_or_stdin(text: Option<String>) -> Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            Ok(buffer)
        }
    }
}

/// Load the voice list off the session loop, then tell the controller
fn load_voices_in_background(synthesizer: Arc<dyn SpeechSynthesizer>, handle: SessionHandle) {
    tokio::spawn(async move {
        match synthesizer.refresh_voices().await {
            Ok(count) => {
                debug!(count, "Voice list ready");
                handle.voices_changed();
            }
            Err(e) => warn!(error = %e, "Could not load synthesis voices"),
        }
    });
}

/// Typed capture: listen again every time the session returns to idle
fn listen_whenever_idle(mut state_rx: watch::Receiver<SessionState>, handle: SessionHandle) {
    tokio::spawn(async move {
        handle.toggle();
        while state_rx.changed().await.is_ok() {
            let idle = *state_rx.borrow_and_update() == SessionState::Idle;
            if idle && !handle.toggle() {
                break;
            }
        }
    });
}

/// Recorder capture: every Enter press toggles listening
fn toggle_on_enter(handle: SessionHandle) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(_)) => {
                    if !handle.toggle() {
                        break;
                    }
                }
                Ok(None) => {
                    handle.input_closed();
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read keyboard input");
                    handle.input_closed();
                    break;
                }
            }
        }
    });
}

/// Run an interactive session
async fn talk(capture: CaptureMode, output: OutputArgs, endpoint: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let (handle, inbox) = session_channel();

    let synthesizer = build_synthesizer(output.engine);
    load_voices_in_background(synthesizer.clone(), handle.clone());

    let queue = build_queue(cfg, synthesizer, output.mode);
    let source = build_source(cfg, endpoint);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    let (recognizer, idle_hint): (Box<dyn Recognizer>, &str) = match capture {
        CaptureMode::Typed => {
            listen_whenever_idle(state_rx, handle.clone());
            (
                Box::new(TypedRecognizer::stdin(handle.clone())),
                "Type a message and press Enter",
            )
        }
        CaptureMode::Recorder => {
            toggle_on_enter(handle.clone());
            (
                Box::new(RecorderRecognizer::new(cfg.capture.clone(), handle.clone())),
                "Press Enter to start speaking",
            )
        }
    };

    let ui = TerminalUi::new(cfg.error_dismiss_after)
        .with_idle_hint(idle_hint)
        .with_state_channel(state_tx);

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    println!("🎙️  parley → {}", source.endpoint());
    println!("[{}]", idle_hint);

    let controller =
        SessionController::new(recognizer, Box::new(source), queue, Box::new(ui), inbox);
    let session = controller.run().await;

    println!();
    println!("Session {} ended after {} turn(s)", &session.id.to_string()[..8], session.turns);
    if let Some(error) = session.last_error {
        println!("Last error: {}", error);
    }

    Ok(())
}

/// One turn without capture
async fn ask(text: Option<String>, output: OutputArgs, endpoint: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let text = text_or_stdin(text)?;

    let synthesizer = build_synthesizer(output.engine);
    if let Err(e) = synthesizer.refresh_voices().await {
        warn!(error = %e, "Could not load synthesis voices");
    }

    let source = build_source(cfg, endpoint);
    println!("👤 {}", text.trim());

    let reply = source.send(&text).await?;
    println!("🤖 {}", reply);

    let mut queue = build_queue(cfg, synthesizer, output.mode);
    queue.play(&reply, None).await;

    Ok(())
}

/// Speak text through the queue only
async fn speak(text: Option<String>, output: OutputArgs) -> Result<()> {
    let cfg = config::config()?;
    let text = text_or_stdin(text)?;
    let message = AssistantMessage::new(text).context("Nothing to speak")?;

    let synthesizer = build_synthesizer(output.engine);
    if let Err(e) = synthesizer.refresh_voices().await {
        warn!(error = %e, "Could not load synthesis voices");
    }

    let mut queue = build_queue(cfg, synthesizer, output.mode);
    let summary = queue.play(&message, None).await;

    if summary.failures > 0 {
        println!(
            "⚠️  {} of {} utterance(s) failed",
            summary.failures, summary.utterances
        );
    }

    Ok(())
}

/// List voices and mark the selected one
async fn list_voices(engine: Option<EngineChoice>) -> Result<()> {
    let cfg = config::config()?;
    let synthesizer = build_synthesizer(engine);
    synthesizer.refresh_voices().await?;

    let voices = synthesizer.voices();
    let resolver = VoicePreferenceResolver::new(cfg.voice.clone());
    let selected = resolver.resolve(&voices);

    println!();
    println!("Voices ({})", synthesizer.name());
    println!("══════════════════════════════════════════════════════════════");

    if voices.is_empty() {
        println!("  (no voices reported)");
    }

    for voice in &voices {
        let marker = if selected.as_ref() == Some(voice) { "*" } else { " " };
        println!("{} {:<32} {:<8} {:?}", marker, voice.name, voice.lang, voice.gender);
    }

    println!();
    match selected {
        Some(voice) => println!("Selected: {} ({})", voice.name, voice.lang),
        None => println!("Selected: none"),
    }

    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("══════════════════════════════════════════════════════════════");
    println!("  parley configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Home:        {}", cfg.home.display());
    println!();
    println!("Backend:");
    println!("  Endpoint: {}", cfg.endpoint());
    println!();
    println!("Capture:");
    println!("  Language:       {}", cfg.capture.language);
    println!("  Record command: {}", cfg.capture.record_command.join(" "));
    println!(
        "  Whisper:        {} (model {})",
        cfg.capture.whisper_binary, cfg.capture.whisper_model
    );
    println!();
    println!("Voice preference:");
    println!(
        "  1. {} + \"{}\"",
        cfg.voice.preferred_locale, cfg.voice.preferred_marker
    );
    println!(
        "  2. {} without \"{}\"",
        cfg.voice.fallback_locale, cfg.voice.excluded_marker
    );
    println!("  3. first available");
    println!();
    println!("Speech:");
    println!("  Mode:   {:?}", cfg.speech_mode);
    println!("  Rate:   {}", cfg.speech.rate);
    println!("  Pitch:  {}", cfg.speech.pitch);
    println!("  Volume: {}", cfg.speech.volume);
    println!();
    println!("Errors auto-hide after {}s", cfg.error_dismiss_after.as_secs());

    Ok(())
}
