//! Shared types for the Parley roleplay voice trainer.
//!
//! This crate provides the foundational types used across all Parley crates:
//! the emotion tag attached to a scenario, the scenario document produced by
//! the authoring service, the session record, and the transcript entry model.
//!
//! No crate in the workspace depends on anything *except* `parley-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use serde::{Deserialize, Serialize};

pub mod scenario;
pub mod transcript;

pub use scenario::{DialogueLine, ScenarioDocument, ScenarioRole};
pub use transcript::{SpeakerRole, TranscriptEntry};

/// Emotional tone attached to a scenario and its live session.
///
/// The core treats the emotion as an opaque enum value passed through to the
/// authoring and credential issuance services; the only local knowledge is the
/// realtime voice each emotion maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Neutral,
}

impl Emotion {
    /// Returns the canonical lowercase label for this emotion.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Neutral => "neutral",
        }
    }

    /// Returns the realtime voice name used for this emotion.
    pub fn voice(self) -> &'static str {
        match self {
            Self::Happy => "alloy",
            Self::Sad => "verse",
            Self::Angry => "coral",
            Self::Neutral => "sage",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scenario session as tracked by the orchestrator.
///
/// `session_id` is assigned by the authoring service and immutable once set.
/// `published` flips to `true` after a successful publish call and never
/// reverts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier assigned by the authoring service.
    pub session_id: String,
    /// The generated scenario document, when present.
    pub scenario: Option<ScenarioDocument>,
    /// Whether the scenario has been published.
    pub published: bool,
    /// The emotional tone configured for this session.
    pub emotion: Emotion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_serde_round_trip() {
        let json = serde_json::to_string(&Emotion::Angry).unwrap();
        assert_eq!(json, r#""angry""#);
        let parsed: Emotion = serde_json::from_str(r#""neutral""#).unwrap();
        assert_eq!(parsed, Emotion::Neutral);
    }

    #[test]
    fn emotion_voice_mapping() {
        assert_eq!(Emotion::Happy.voice(), "alloy");
        assert_eq!(Emotion::Sad.voice(), "verse");
        assert_eq!(Emotion::Angry.voice(), "coral");
        assert_eq!(Emotion::Neutral.voice(), "sage");
    }

    #[test]
    fn session_published_defaults_false_on_fresh() {
        let session = Session {
            session_id: "s-1".to_string(),
            scenario: None,
            published: false,
            emotion: Emotion::Happy,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["published"], false);
        assert_eq!(json["emotion"], "happy");
    }
}
