//! Audio frames and per-track forwarding
//!
//! The room service hands the session one lazy frame sequence per subscribed
//! audio track; a forwarding task pumps each sequence into a streaming
//! transcription call and appends finalized results to the transcript ledger.

mod forwarder;

pub use forwarder::{AudioForwarder, ForwardOutcome};

use tokio::sync::mpsc;

use crate::transcript::Speaker;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the session started
    pub timestamp_ms: u64,
}

/// One subscribed audio track from the room service
///
/// The frame receiver is a lazy, unbounded, non-restartable sequence: it
/// ends when the remote side closes the track.
pub struct AudioTrack {
    /// Which participant this track belongs to
    pub speaker: Speaker,

    /// The track's frame sequence
    pub frames: mpsc::Receiver<AudioFrame>,
}
