// Tests for the audio forwarding task
//
// A loopback transcription stub turns every pushed frame into one final
// transcript event, so frame pumping, final-only appending, and
// cooperative cancellation can be asserted end to end.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use hireflow::audio::{AudioForwarder, AudioFrame, AudioTrack, ForwardOutcome};
use hireflow::session::ActivityClock;
use hireflow::stt::{SpeechToText, StreamConfig, TranscriptEvent};
use hireflow::transcript::{Speaker, TranscriptLedger, Utterance};
use tokio::sync::{mpsc, watch};

/// Emits one interim and one final event per pushed frame
struct LoopbackStt;

#[async_trait::async_trait]
impl SpeechToText for LoopbackStt {
    async fn start_stream(
        &self,
        _config: StreamConfig,
    ) -> Result<(mpsc::Sender<AudioFrame>, mpsc::Receiver<TranscriptEvent>)> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(64);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(64);

        tokio::spawn(async move {
            let mut n = 0usize;
            while let Some(_frame) = frame_rx.recv().await {
                n += 1;
                let interim = TranscriptEvent {
                    text: format!("partial {}", n),
                    is_final: false,
                    confidence: None,
                    timestamp: Utc::now(),
                };
                let fin = TranscriptEvent {
                    text: format!("utterance {}", n),
                    is_final: true,
                    confidence: Some(0.9),
                    timestamp: Utc::now(),
                };
                if event_tx.send(interim).await.is_err() || event_tx.send(fin).await.is_err() {
                    return;
                }
            }
            // Frame sender dropped: finalize by closing the event channel
        });

        Ok((frame_tx, event_rx))
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

/// Single-slot channels on both sides; emits two final events per frame and
/// accepts the next frame only once both are delivered
struct BackpressureStt;

#[async_trait::async_trait]
impl SpeechToText for BackpressureStt {
    async fn start_stream(
        &self,
        _config: StreamConfig,
    ) -> Result<(mpsc::Sender<AudioFrame>, mpsc::Receiver<TranscriptEvent>)> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(1);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(1);

        tokio::spawn(async move {
            let mut n = 0usize;
            while let Some(_frame) = frame_rx.recv().await {
                for _ in 0..2 {
                    n += 1;
                    let fin = TranscriptEvent {
                        text: format!("chunk {}", n),
                        is_final: true,
                        confidence: None,
                        timestamp: Utc::now(),
                    };
                    if event_tx.send(fin).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok((frame_tx, event_rx))
    }

    fn name(&self) -> &str {
        "backpressure"
    }
}

fn frame() -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }
}

#[tokio::test]
async fn test_only_final_events_reach_the_ledger() {
    let ledger = TranscriptLedger::new();
    let activity = ActivityClock::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (utterance_tx, mut utterance_rx) = mpsc::channel::<Utterance>(64);

    let (frame_tx, frames) = mpsc::channel(64);
    let track = AudioTrack {
        speaker: Speaker::Candidate,
        frames,
    };

    let handle = AudioForwarder::spawn(
        track,
        Arc::new(LoopbackStt),
        ledger.clone(),
        activity.clone(),
        utterance_tx,
        shutdown_rx,
    );

    for _ in 0..3 {
        frame_tx.send(frame()).await.unwrap();
    }
    drop(frame_tx);

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome, ForwardOutcome::SourceClosed));

    // Three final events, zero interim events
    let snapshot = ledger.snapshot().await;
    assert_eq!(snapshot.len(), 3);
    for (i, utterance) in snapshot.iter().enumerate() {
        assert_eq!(utterance.speaker, Speaker::Candidate);
        assert_eq!(utterance.text, format!("utterance {}", i + 1));
    }

    // The coordinator copy matches the ledger
    for i in 0..3 {
        let copy = utterance_rx.recv().await.unwrap();
        assert_eq!(copy.text, format!("utterance {}", i + 1));
    }

    // Final activity was recorded just now
    assert!(activity.idle_for() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_backpressured_stream_keeps_draining_events() {
    let ledger = TranscriptLedger::new();
    let activity = ActivityClock::new();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (utterance_tx, mut utterance_rx) = mpsc::channel::<Utterance>(64);

    let (frame_tx, frames) = mpsc::channel(1);
    let track = AudioTrack {
        speaker: Speaker::Candidate,
        frames,
    };

    let handle = AudioForwarder::spawn(
        track,
        Arc::new(BackpressureStt),
        ledger.clone(),
        activity,
        utterance_tx,
        shutdown_rx,
    );

    // The stream won't take a frame while it has events waiting, so this
    // only completes if events are drained concurrently with frame sends
    for _ in 0..4 {
        frame_tx.send(frame()).await.unwrap();
    }
    drop(frame_tx);

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("forwarder must not stall on stream backpressure")
        .unwrap();
    assert!(matches!(outcome, ForwardOutcome::SourceClosed));

    assert_eq!(ledger.len().await, 8);
    for i in 0..8 {
        let copy = utterance_rx.recv().await.unwrap();
        assert_eq!(copy.text, format!("chunk {}", i + 1));
    }
}

#[tokio::test]
async fn test_forwarder_cancels_on_shutdown_signal() {
    let ledger = TranscriptLedger::new();
    let activity = ActivityClock::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (utterance_tx, _utterance_rx) = mpsc::channel::<Utterance>(64);

    // Track stays open for the whole test
    let (_frame_tx, frames) = mpsc::channel(64);
    let track = AudioTrack {
        speaker: Speaker::Candidate,
        frames,
    };

    let handle = AudioForwarder::spawn(
        track,
        Arc::new(LoopbackStt),
        ledger.clone(),
        activity,
        utterance_tx,
        shutdown_rx,
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(true).unwrap();

    let outcome = handle.await.unwrap();
    assert!(matches!(outcome, ForwardOutcome::Cancelled));
    assert!(ledger.is_empty().await);
}
