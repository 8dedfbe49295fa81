use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{AudioFrame, AudioTrack};
use crate::session::ActivityClock;
use crate::stt::{SpeechToText, StreamConfig};
use crate::transcript::{TranscriptLedger, Utterance};

/// Why a forwarding task ended
pub enum ForwardOutcome {
    /// The track's frame sequence closed normally
    SourceClosed,

    /// The transcription stream failed mid-track; the unconsumed frame
    /// sequence is handed back so the coordinator can restart forwarding
    StreamFailed(mpsc::Receiver<AudioFrame>),

    /// The session shutdown signal was observed
    Cancelled,
}

/// How the frame pump ended
enum PumpEnd {
    /// The frame sequence closed; the dropped stream sender lets the
    /// service finalize and close the event channel
    SourceClosed,

    /// The stream stopped accepting frames
    StreamClosed(mpsc::Receiver<AudioFrame>),

    /// Stopped on request, frame sequence intact
    Stopped(mpsc::Receiver<AudioFrame>),
}

/// Pushes frames into the transcription stream
///
/// Runs apart from the event consumer so a send waiting on the stream's
/// backpressure never stops transcription events from being drained.
async fn pump_frames(
    mut frames: mpsc::Receiver<AudioFrame>,
    frame_tx: mpsc::Sender<AudioFrame>,
    mut stop: watch::Receiver<bool>,
) -> PumpEnd {
    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    return PumpEnd::Stopped(frames);
                }
            }
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if frame_tx.send(frame).await.is_err() {
                        return PumpEnd::StreamClosed(frames);
                    }
                }
                None => return PumpEnd::SourceClosed,
            }
        }
    }
}

/// Forwards one audio track into a streaming transcription call
///
/// Only finalized transcription results are appended to the ledger, tagged
/// with the track's speaker and stamped with the event time. A transcription
/// failure ends this task only; the session keeps running.
pub struct AudioForwarder;

impl AudioForwarder {
    /// Spawn the forwarding task for one track
    pub fn spawn(
        track: AudioTrack,
        stt: Arc<dyn SpeechToText>,
        ledger: TranscriptLedger,
        activity: ActivityClock,
        utterances: mpsc::Sender<Utterance>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<ForwardOutcome> {
        tokio::spawn(Self::run(track, stt, ledger, activity, utterances, shutdown))
    }

    /// Forwarding loop; exposed so the coordinator can supervise it
    pub async fn run(
        track: AudioTrack,
        stt: Arc<dyn SpeechToText>,
        ledger: TranscriptLedger,
        activity: ActivityClock,
        utterances: mpsc::Sender<Utterance>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ForwardOutcome {
        let speaker = track.speaker;
        let frames = track.frames;

        if *shutdown.borrow() {
            return ForwardOutcome::Cancelled;
        }

        info!("Audio forwarding task started ({:?} track)", speaker);

        let (frame_tx, mut events) = match stt.start_stream(StreamConfig::default()).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    "Failed to start transcription stream on {}: {}",
                    stt.name(),
                    e
                );
                return ForwardOutcome::StreamFailed(frames);
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let pump = tokio::spawn(pump_frames(frames, frame_tx, stop_rx));

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Audio forwarding task cancelled ({:?} track)", speaker);
                        pump.abort();
                        return ForwardOutcome::Cancelled;
                    }
                }

                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if event.is_final {
                                let utterance = Utterance {
                                    speaker,
                                    text: event.text,
                                    timestamp: event.timestamp,
                                };
                                ledger.append_at(utterance.clone()).await;
                                activity.touch();
                                // Hand the coordinator a copy so it can
                                // drive the interview script
                                let _ = utterances.send(utterance).await;
                            }
                        }
                        None => {
                            // Event channel closed; reclaim the frame
                            // sequence from the pump to tell a normal end
                            // from a stream failure
                            let _ = stop_tx.send(true);
                            return match pump.await {
                                Ok(PumpEnd::SourceClosed) => {
                                    info!(
                                        "Audio forwarding task finished ({:?} track)",
                                        speaker
                                    );
                                    ForwardOutcome::SourceClosed
                                }
                                Ok(PumpEnd::StreamClosed(frames))
                                | Ok(PumpEnd::Stopped(frames)) => {
                                    warn!(
                                        "Transcription event stream on {} ended unexpectedly ({:?})",
                                        stt.name(),
                                        speaker
                                    );
                                    ForwardOutcome::StreamFailed(frames)
                                }
                                Err(e) => {
                                    error!("Frame pump task panicked: {}", e);
                                    ForwardOutcome::SourceClosed
                                }
                            };
                        }
                    }
                }
            }
        }
    }
}
