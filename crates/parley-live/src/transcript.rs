//! Append-only transcript log.
//!
//! The log is the single funnel for everything the operator sees: the
//! orchestrator's own status narration, classified side-channel events, and
//! failure reports. Insertion order matches the causal order of narrated
//! events and inbound messages — there is no reordering buffer and no
//! batching. A broadcast feed mirrors every appended entry so a presentation
//! layer can render the transcript live.

use parley_types::{SpeakerRole, TranscriptEntry};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Capacity of the live transcript broadcast channel.
const TRANSCRIPT_BROADCAST_CAPACITY: usize = 256;

/// Append-only ordered record of transcript entries.
#[derive(Debug)]
pub struct TranscriptLog {
    entries: Mutex<Vec<TranscriptEntry>>,
    feed: broadcast::Sender<TranscriptEntry>,
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(TRANSCRIPT_BROADCAST_CAPACITY);
        Self {
            entries: Mutex::new(Vec::new()),
            feed,
        }
    }

    /// Appends an entry, assigning the next sequence number, and mirrors it
    /// on the broadcast feed.
    pub fn append(&self, role: SpeakerRole, text: impl Into<String>) -> TranscriptEntry {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = TranscriptEntry {
            role,
            text: text.into(),
            seq: entries.len() as u64,
        };
        entries.push(entry.clone());
        let _ = self.feed.send(entry.clone());
        entry
    }

    /// Returns a copy of the log in insertion order.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to entries appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEntry> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let log = TranscriptLog::new();
        log.append(SpeakerRole::System, "first");
        log.append(SpeakerRole::Bot, "second");
        log.append(SpeakerRole::Info, "third");

        let entries = log.snapshot();
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let log = TranscriptLog::new();
        for i in 0..5 {
            let entry = log.append(SpeakerRole::System, format!("line {i}"));
            assert_eq!(entry.seq, i);
        }
    }

    #[tokio::test]
    async fn subscribers_see_appends() {
        let log = TranscriptLog::new();
        let mut rx = log.subscribe();
        log.append(SpeakerRole::Bot, "hello");

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.role, SpeakerRole::Bot);
        assert_eq!(entry.text, "hello");
    }
}
