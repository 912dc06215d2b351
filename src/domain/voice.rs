//! Synthesis voice descriptions.

use serde::{Deserialize, Serialize};

/// A voice offered by the synthesis platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Engine-specific identifier passed back when speaking
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Language tag as reported by the engine (`en-GB`, `en_GB`, ...)
    pub lang: String,

    /// Best-effort gender guess from the name
    pub gender: GenderHint,
}

impl VoiceProfile {
    /// Create a profile whose id is its name
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            gender: GenderHint::from_name(&name),
            name,
            lang: lang.into(),
        }
    }

    /// Override the engine identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether the language tag contains `locale`.
    ///
    /// `_` and `-` are treated alike and case is ignored, so `en_GB`
    /// matches `en-GB`.
    pub fn matches_locale(&self, locale: &str) -> bool {
        let normalize = |s: &str| s.replace('_', "-").to_ascii_lowercase();
        normalize(&self.lang).contains(&normalize(locale))
    }

    /// Whether the name contains `marker` (case-sensitive, so "Female"
    /// does not suggest "Male")
    pub fn name_suggests(&self, marker: &str) -> bool {
        !marker.is_empty() && self.name.contains(marker)
    }
}

/// Gender guessed from a voice name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderHint {
    Male,
    Female,
    Unknown,
}

impl GenderHint {
    /// Guess from name substrings
    pub fn from_name(name: &str) -> Self {
        if name.contains("Female") {
            Self::Female
        } else if name.contains("Male") {
            Self::Male
        } else {
            Self::Unknown
        }
    }
}
