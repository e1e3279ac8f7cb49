//! Transcript entry model.
//!
//! Entries are append-only and ordered by a monotonic sequence number
//! assigned at insertion. Ordering is insertion order and is preserved
//! exactly as produced — no reordering, no deduplication.

use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    /// Orchestrator status narration.
    System,
    /// The local operator.
    User,
    /// The remote AI counterpart.
    Bot,
    /// Unclassified side-channel payloads.
    Info,
}

impl SpeakerRole {
    /// Returns the canonical lowercase label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Bot => "bot",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Who produced the entry.
    pub role: SpeakerRole,
    /// The entry text, stored verbatim.
    pub text: String,
    /// Monotonic insertion order within one transcript log.
    pub seq: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels() {
        assert_eq!(SpeakerRole::System.as_str(), "system");
        assert_eq!(SpeakerRole::Bot.to_string(), "bot");
    }

    #[test]
    fn entry_serde_round_trip() {
        let entry = TranscriptEntry {
            role: SpeakerRole::Info,
            text: "{not json".to_string(),
            seq: 7,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: TranscriptEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
