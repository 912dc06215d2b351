//! Synthesis voice selection.
//!
//! Selection is a waterfall of predicates; the first one with a match wins:
//! 1. preferred locale and a name suggesting the preferred gender
//! 2. fallback locale and a name not suggesting the excluded gender
//! 3. the first voice offered

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::VoiceProfile;

/// Ranked voice preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicePolicy {
    /// Locale tried first (default: en-GB)
    #[serde(default = "default_preferred_locale")]
    pub preferred_locale: String,

    /// Name substring the first choice must contain (default: Male)
    #[serde(default = "default_preferred_marker")]
    pub preferred_marker: String,

    /// Locale for the second rule (default: en-US)
    #[serde(default = "default_fallback_locale")]
    pub fallback_locale: String,

    /// Name substring the second choice must not contain (default: Female)
    #[serde(default = "default_excluded_marker")]
    pub excluded_marker: String,
}

fn default_preferred_locale() -> String {
    "en-GB".to_string()
}
fn default_preferred_marker() -> String {
    "Male".to_string()
}
fn default_fallback_locale() -> String {
    "en-US".to_string()
}
fn default_excluded_marker() -> String {
    "Female".to_string()
}

impl Default for VoicePolicy {
    fn default() -> Self {
        Self {
            preferred_locale: default_preferred_locale(),
            preferred_marker: default_preferred_marker(),
            fallback_locale: default_fallback_locale(),
            excluded_marker: default_excluded_marker(),
        }
    }
}

/// Picks one voice from the platform's list
#[derive(Debug, Clone, Default)]
pub struct VoicePreferenceResolver {
    policy: VoicePolicy,
}

impl VoicePreferenceResolver {
    pub fn new(policy: VoicePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &VoicePolicy {
        &self.policy
    }

    /// Select a voice, or `None` when the list is empty
    pub fn resolve(&self, voices: &[VoiceProfile]) -> Option<VoiceProfile> {
        let policy = &self.policy;

        let selected = voices
            .iter()
            .find(|v| {
                v.matches_locale(&policy.preferred_locale)
                    && v.name_suggests(&policy.preferred_marker)
            })
            .or_else(|| {
                voices.iter().find(|v| {
                    v.matches_locale(&policy.fallback_locale)
                        && !v.name_suggests(&policy.excluded_marker)
                })
            })
            .or_else(|| voices.first())
            .cloned();

        debug!(
            available = voices.len(),
            selected = selected.as_ref().map(|v| v.name.as_str()).unwrap_or("none"),
            "Resolved synthesis voice"
        );

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<VoiceProfile> {
        vec![
            VoiceProfile::new("Samantha Female", "en-US"),
            VoiceProfile::new("Alex", "en-US"),
            VoiceProfile::new("Google UK English Male", "en-GB"),
        ]
    }

    #[test]
    fn test_empty_list_resolves_to_none() {
        let resolver = VoicePreferenceResolver::default();
        assert!(resolver.resolve(&[]).is_none());
    }

    #[test]
    fn test_preferred_locale_and_gender_wins() {
        let resolver = VoicePreferenceResolver::default();
        let voice = resolver.resolve(&voices()).unwrap();
        assert_eq!(voice.name, "Google UK English Male");
    }

    #[test]
    fn test_fallback_skips_excluded_gender() {
        let resolver = VoicePreferenceResolver::default();
        let list = &voices()[..2];
        let voice = resolver.resolve(list).unwrap();
        assert_eq!(voice.name, "Alex");
    }

    #[test]
    fn test_first_voice_when_nothing_matches() {
        let resolver = VoicePreferenceResolver::default();
        let list = vec![
            VoiceProfile::new("Amélie", "fr-CA"),
            VoiceProfile::new("Anna", "de-DE"),
        ];
        assert_eq!(resolver.resolve(&list).unwrap().name, "Amélie");
    }

    #[test]
    fn test_custom_policy() {
        let resolver = VoicePreferenceResolver::new(VoicePolicy {
            preferred_locale: "en-US".to_string(),
            preferred_marker: "Female".to_string(),
            ..Default::default()
        });
        assert_eq!(resolver.resolve(&voices()).unwrap().name, "Samantha Female");
    }
}
