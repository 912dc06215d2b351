//! Configuration for parley.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (PARLEY_ENDPOINT)
//! 2. Config file
//! 3. Defaults (http://127.0.0.1:5000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .parley/config.yaml
//! - Falls back to config.yaml in parley home (PARLEY_HOME, default ~/.parley)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::backend::PROCESS_VOICE_PATH;
use crate::adapters::recognizer::RecorderSettings;
use crate::core::{SpeechMode, SpeechParams, VoicePolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
    #[serde(default)]
    pub voice: Option<VoicePolicy>,
    #[serde(default)]
    pub speech: Option<SpeechConfig>,
    #[serde(default)]
    pub ui: Option<UiConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    pub language: Option<String>,
    pub whisper_model: Option<String>,
    pub whisper_binary: Option<String>,
    pub record_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(flatten)]
    pub params: SpeechParams,
    #[serde(default)]
    pub mode: Option<SpeechMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub error_dismiss_seconds: Option<u64>,
}

/// Resolved backend location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub base_url: String,
    pub path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            path: PROCESS_VOICE_PATH.to_string(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Parley home; holds the user-level config.yaml
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub backend: BackendSettings,
    pub capture: RecorderSettings,
    pub voice: VoicePolicy,
    pub speech: SpeechParams,
    pub speech_mode: SpeechMode,
    /// How long an error stays on screen
    pub error_dismiss_after: Duration,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`, before any file or env overrides
    pub fn defaults(home: PathBuf) -> Self {
        Self {
            home,
            config_file: None,
            backend: BackendSettings::default(),
            capture: RecorderSettings::default(),
            voice: VoicePolicy::default(),
            speech: SpeechParams::default(),
            speech_mode: SpeechMode::default(),
            error_dismiss_after: Duration::from_secs(5),
        }
    }

    /// Overlay values from a parsed config file
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(backend) = file.backend {
            if let Some(base_url) = backend.base_url {
                self.backend.base_url = base_url;
            }
            if let Some(path) = backend.path {
                self.backend.path = path;
            }
        }

        if let Some(capture) = file.capture {
            if let Some(language) = capture.language {
                self.capture.language = language;
            }
            if let Some(model) = capture.whisper_model {
                self.capture.whisper_model = model;
            }
            if let Some(binary) = capture.whisper_binary {
                self.capture.whisper_binary = binary;
            }
            if let Some(command) = capture.record_command.filter(|c| !c.is_empty()) {
                self.capture.record_command = command;
            }
        }

        if let Some(voice) = file.voice {
            self.voice = voice;
        }

        if let Some(speech) = file.speech {
            self.speech = speech.params;
            if let Some(mode) = speech.mode {
                self.speech_mode = mode;
            }
        }

        if let Some(seconds) = file.ui.and_then(|ui| ui.error_dismiss_seconds) {
            self.error_dismiss_after = Duration::from_secs(seconds);
        }
    }

    /// Full backend URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.backend.base_url.trim_end_matches('/'),
            self.backend.path.trim_start_matches('/')
        )
    }
}

/// Find the project config in `start` or a parent, else the user config
/// in `home`
fn find_config_file(start: Option<&Path>, home: &Path) -> Option<PathBuf> {
    if let Some(start) = start {
        for dir in start.ancestors() {
            let config_path = dir.join(".parley").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }
        }
    }

    let user_config = home.join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".parley");

    let home = std::env::var("PARLEY_HOME")
        .map(PathBuf::from)
        .unwrap_or(default_home);

    let mut config = ResolvedConfig::defaults(home.clone());

    let cwd = std::env::current_dir().ok();
    if let Some(config_path) = find_config_file(cwd.as_deref(), &home) {
        let file = load_config_file(&config_path)?;
        config.apply_file(file);
        config.config_file = Some(config_path);
    }

    if let Ok(endpoint) = std::env::var("PARLEY_ENDPOINT") {
        config.backend.base_url = endpoint;
    }

    Ok(config)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
