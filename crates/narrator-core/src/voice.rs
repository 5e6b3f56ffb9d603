//! Voice records and preference-based voice selection.
//!
//! Speech engines rarely expose structured gender or locale metadata, so the
//! preference is matched heuristically against names and tags. The heuristic
//! lives behind `VoiceMatcher` so hosts can swap in an engine-specific one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque engine-specific voice identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: VoiceId,
    pub display_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Voice {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: VoiceId::new(id),
            display_name: display_name.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Preferred voice gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoicePreference {
    Female,
    Male,
}

impl fmt::Display for VoicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoicePreference::Female => "female",
            VoicePreference::Male => "male",
        };
        write!(f, "{}", label)
    }
}

pub trait VoiceMatcher {
    fn matches(&self, voice: &Voice, preference: VoicePreference) -> bool;
}

/// Case-insensitive substring match over the display name and tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

const FEMALE_MARKERS: &[&str] = &["female", "женск"];
const MALE_MARKERS: &[&str] = &["male", "мужск"];

impl SubstringMatcher {
    fn haystacks(voice: &Voice) -> impl Iterator<Item = String> + '_ {
        std::iter::once(voice.display_name.to_lowercase())
            .chain(voice.tags.iter().map(|tag| tag.to_lowercase()))
    }

    fn mentions(voice: &Voice, markers: &[&str]) -> bool {
        Self::haystacks(voice).any(|text| markers.iter().any(|marker| text.contains(marker)))
    }
}

impl VoiceMatcher for SubstringMatcher {
    fn matches(&self, voice: &Voice, preference: VoicePreference) -> bool {
        let female = Self::mentions(voice, FEMALE_MARKERS);
        match preference {
            VoicePreference::Female => female,
            // "male" is a substring of "female".
            VoicePreference::Male => !female && Self::mentions(voice, MALE_MARKERS),
        }
    }
}

/// First voice accepted by `matcher`, falling back to the first voice.
pub fn select_voice<'a>(
    voices: &'a [Voice],
    preference: VoicePreference,
    matcher: &dyn VoiceMatcher,
) -> Option<&'a Voice> {
    voices
        .iter()
        .find(|voice| matcher.matches(voice, preference))
        .or_else(|| voices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Voice> {
        vec![
            Voice::new("sapi/david", "Microsoft David Desktop - English (United States)"),
            Voice::new("sapi/irina", "Microsoft Irina Desktop - Russian").with_tags(["female"]),
            Voice::new("rhv/aleksandr", "Aleksandr (мужской голос)"),
        ]
    }

    #[test]
    fn female_preference_uses_tags() {
        let voices = catalog();
        let picked = select_voice(&voices, VoicePreference::Female, &SubstringMatcher);
        assert_eq!(picked.map(|v| v.id.as_str()), Some("sapi/irina"));
    }

    #[test]
    fn male_preference_skips_female_voices() {
        let voices = vec![
            Voice::new("a", "English Female"),
            Voice::new("b", "English Male"),
        ];
        let picked = select_voice(&voices, VoicePreference::Male, &SubstringMatcher);
        assert_eq!(picked.map(|v| v.id.as_str()), Some("b"));
    }

    #[test]
    fn russian_markers_match() {
        let voices = catalog();
        let picked = select_voice(&voices, VoicePreference::Male, &SubstringMatcher);
        assert_eq!(picked.map(|v| v.id.as_str()), Some("rhv/aleksandr"));
    }

    #[test]
    fn falls_back_to_first_voice() {
        let voices = vec![Voice::new("en_US-ryan-high", "en_US-ryan-high")];
        let picked = select_voice(&voices, VoicePreference::Female, &SubstringMatcher);
        assert_eq!(picked.map(|v| v.id.as_str()), Some("en_US-ryan-high"));
        assert!(select_voice(&[], VoicePreference::Female, &SubstringMatcher).is_none());
    }

    #[test]
    fn custom_matcher_is_honored() {
        struct ByLocale;
        impl VoiceMatcher for ByLocale {
            fn matches(&self, voice: &Voice, _preference: VoicePreference) -> bool {
                voice.tags.iter().any(|tag| tag == "ru")
            }
        }
        let voices = vec![
            Voice::new("en", "English").with_tags(["en"]),
            Voice::new("ru", "Russian").with_tags(["ru"]),
        ];
        let picked = select_voice(&voices, VoicePreference::Male, &ByLocale);
        assert_eq!(picked.map(|v| v.id.as_str()), Some("ru"));
    }
}
