//! Streaming speech-to-text seam
//!
//! The remote transcription service is consumed as a black box: audio frames
//! go in on one channel, interim and final transcript events come back on
//! another. Vendor SDK adapters implement [`SpeechToText`]; the session core
//! never sees anything vendor-specific.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::audio::AudioFrame;

/// Configuration for one streaming recognition session
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Optional language hint (ISO 639-1, e.g. "en")
    pub language_hint: Option<String>,

    /// Sample rate of the pushed frames
    pub sample_rate: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            language_hint: None,
            sample_rate: 16000,
        }
    }
}

/// One incremental recognition result
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    /// Transcribed text so far (interim) or for the utterance (final)
    pub text: String,

    /// Whether this is a finalized result; only finalized results reach
    /// the transcript ledger
    pub is_final: bool,

    /// Confidence score (0.0 to 1.0), if the service reports one
    pub confidence: Option<f32>,

    /// Event time as reported by the service
    pub timestamp: DateTime<Utc>,
}

/// Streaming transcription backend
///
/// `start_stream` returns a sender for audio frames and a receiver for
/// recognition events. Dropping the sender signals end of audio; the service
/// closes the event channel once the stream is drained. A closed or errored
/// event channel ends the owning forwarding task, never the session.
#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn start_stream(
        &self,
        config: StreamConfig,
    ) -> Result<(mpsc::Sender<AudioFrame>, mpsc::Receiver<TranscriptEvent>)>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
