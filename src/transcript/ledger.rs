use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The interviewee
    Candidate,
    /// The automated interviewer
    Agent,
}

/// One entry in the transcript ledger
///
/// Immutable once appended; the ledger never mutates or removes entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Who spoke
    pub speaker: Speaker,

    /// Transcribed or generated text
    pub text: String,

    /// When the utterance was produced
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only transcript of one interview session
///
/// Cheaply clonable handle; every forwarding task, the turn driver, and the
/// liveness monitor share the same underlying log. Appends are safe from any
/// task. Ordering is by timestamp, not call order: concurrent speakers may
/// hand in event-time stamps that interleave, and `snapshot()` resolves that
/// with a stable sort.
#[derive(Clone, Default)]
pub struct TranscriptLedger {
    entries: Arc<Mutex<Vec<Utterance>>>,
}

impl TranscriptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an utterance stamped with the current time
    pub async fn append(&self, speaker: Speaker, text: impl Into<String>) {
        self.append_at(Utterance::new(speaker, text)).await;
    }

    /// Append an utterance carrying its own event-time stamp
    ///
    /// Used by forwarding tasks, which stamp entries with the transcription
    /// event time rather than the append time.
    pub async fn append_at(&self, utterance: Utterance) {
        let mut entries = self.entries.lock().await;
        entries.push(utterance);
    }

    /// Immutable copy of the ledger, in non-decreasing timestamp order
    ///
    /// Safe to call at any point in the session; entries present at call
    /// time are never lost or duplicated.
    pub async fn snapshot(&self) -> Vec<Utterance> {
        let mut entries = {
            let guard = self.entries.lock().await;
            guard.clone()
        };
        entries.sort_by_key(|u| u.timestamp);
        entries
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
