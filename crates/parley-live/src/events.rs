//! Side-channel event routing.
//!
//! Inbound payloads on the data channel are expected-but-not-guaranteed to be
//! JSON with an optional `type` discriminator and an `output` field. The
//! event schema is loosely specified upstream, so decode failure is a normal
//! case here, not an error: anything that does not classify degrades to an
//! `info` entry carrying the raw payload unmodified.

use crate::transcript::TranscriptLog;
use parley_types::{SpeakerRole, TranscriptEntry};
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Classifies inbound side-channel payloads into transcript entries.
#[derive(Debug, Clone)]
pub struct EventChannelRouter {
    log: Arc<TranscriptLog>,
}

impl EventChannelRouter {
    /// Creates a router appending into the given transcript log.
    pub fn new(log: Arc<TranscriptLog>) -> Self {
        Self { log }
    }

    /// Classifies one raw payload and appends the resulting entry.
    ///
    /// Never fails: a payload that decodes into a recognized response shape
    /// becomes a `bot` entry with a stable textual rendering of its output;
    /// everything else becomes an `info` entry with the raw text verbatim.
    pub fn on_message(&self, raw: &str) -> TranscriptEntry {
        match bot_output(raw) {
            Some(output) => {
                trace!(len = output.len(), "side channel response event");
                self.log.append(SpeakerRole::Bot, output)
            }
            None => self.log.append(SpeakerRole::Info, raw),
        }
    }
}

/// Extracts the rendered output of a recognized response payload.
///
/// Recognized shape: a JSON object with `"type": "response"` and an `output`
/// field. The output is rendered with `serde_json::Value::to_string`, which
/// is stable for a given value.
fn bot_output(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("response") {
        return None;
    }
    let output = value.get("output")?;
    if output.is_null() {
        return None;
    }
    Some(output.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EventChannelRouter {
        EventChannelRouter::new(Arc::new(TranscriptLog::new()))
    }

    #[test]
    fn malformed_payload_degrades_to_info() {
        let entry = router().on_message("{not json");
        assert_eq!(entry.role, SpeakerRole::Info);
        assert_eq!(entry.text, "{not json");
    }

    #[test]
    fn response_with_output_classifies_as_bot() {
        let entry = router().on_message(r#"{"type":"response","output":["hi"]}"#);
        assert_eq!(entry.role, SpeakerRole::Bot);
        assert!(entry.text.contains(r#"["hi"]"#));
    }

    #[test]
    fn decodable_but_unrecognized_shape_is_info() {
        let raw = r#"{"type":"session.created","session":{"id":"s"}}"#;
        let entry = router().on_message(raw);
        assert_eq!(entry.role, SpeakerRole::Info);
        assert_eq!(entry.text, raw);
    }

    #[test]
    fn response_without_output_is_info() {
        let raw = r#"{"type":"response"}"#;
        let entry = router().on_message(raw);
        assert_eq!(entry.role, SpeakerRole::Info);
        assert_eq!(entry.text, raw);
    }

    #[test]
    fn non_object_payloads_never_panic() {
        for raw in ["42", r#""plain""#, "[1,2]", "null", "", "true"] {
            let entry = router().on_message(raw);
            assert_eq!(entry.role, SpeakerRole::Info);
            assert_eq!(entry.text, raw);
        }
    }

    #[test]
    fn entries_share_one_ordered_log() {
        let log = Arc::new(TranscriptLog::new());
        let router = EventChannelRouter::new(Arc::clone(&log));
        router.on_message(r#"{"type":"response","output":"a"}"#);
        router.on_message("noise");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, SpeakerRole::Bot);
        assert_eq!(entries[1].role, SpeakerRole::Info);
        assert!(entries[0].seq < entries[1].seq);
    }
}
