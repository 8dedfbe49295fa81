// Integration tests for the session coordinator
//
// The room service, transcription stream, model, and store are all stubbed
// in-process so the full lifecycle (join, forwarding, turn driving,
// disconnect, drain, single flush) runs deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use hireflow::audio::{AudioFrame, AudioTrack};
use hireflow::model::{ChatMessage, LanguageModel, RetryPolicy};
use hireflow::room::RoomEvent;
use hireflow::session::{Question, SessionConfig, SessionCoordinator, SessionError, SessionPhase};
use hireflow::stt::{SpeechToText, StreamConfig, TranscriptEvent};
use hireflow::transcript::{Speaker, TranscriptStore, Utterance};
use tokio::sync::{mpsc, Mutex};

/// Model stub replying from a fixed queue; "3" once the queue runs dry
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        let mut replies = self.replies.lock().await;
        Ok(replies.pop_front().unwrap_or_else(|| "3".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Model stub whose calls never complete
struct HungModel;

#[async_trait::async_trait]
impl LanguageModel for HungModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hung"
    }
}

/// Transcription stub that emits scripted final utterances on a schedule
/// while draining whatever frames arrive
struct ScriptedStt {
    lines: Vec<String>,
    delay: Duration,
}

impl ScriptedStt {
    fn new(lines: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            delay,
        })
    }
}

#[async_trait::async_trait]
impl SpeechToText for ScriptedStt {
    async fn start_stream(
        &self,
        _config: StreamConfig,
    ) -> Result<(mpsc::Sender<AudioFrame>, mpsc::Receiver<TranscriptEvent>)> {
        let (frame_tx, mut frame_rx) = mpsc::channel::<AudioFrame>(64);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptEvent>(64);

        let lines = self.lines.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            for line in lines {
                tokio::time::sleep(delay).await;
                let event = TranscriptEvent {
                    text: line,
                    is_final: true,
                    confidence: Some(0.9),
                    timestamp: Utc::now(),
                };
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            // Keep the stream open until the audio source closes
            while frame_rx.recv().await.is_some() {}
        });

        Ok((frame_tx, event_rx))
    }

    fn name(&self) -> &str {
        "scripted-stt"
    }
}

/// Transcription stub whose streams always fail to start
struct FailingStt {
    calls: AtomicU32,
}

impl FailingStt {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SpeechToText for FailingStt {
    async fn start_stream(
        &self,
        _config: StreamConfig,
    ) -> Result<(mpsc::Sender<AudioFrame>, mpsc::Receiver<TranscriptEvent>)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("simulated stream failure"))
    }

    fn name(&self) -> &str {
        "failing-stt"
    }
}

/// In-memory store that counts saves
#[derive(Default)]
struct MemoryStore {
    saves: Mutex<Vec<(String, Vec<Utterance>)>>,
}

#[async_trait::async_trait]
impl TranscriptStore for MemoryStore {
    async fn save(&self, session_id: &str, entries: &[Utterance]) -> Result<()> {
        let mut saves = self.saves.lock().await;
        saves.push((session_id.to_string(), entries.to_vec()));
        Ok(())
    }
}

fn question(id: &str, title: &str) -> Question {
    Question {
        id: id.to_string(),
        title: title.to_string(),
        body: format!("Tell us about {}", title),
        rubric: "Specific and complete".to_string(),
        max_points: 5,
    }
}

fn config(questions: Vec<Question>) -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        campaign_id: "test-campaign".to_string(),
        questions,
        resume_text: "Ana. Rust developer.".to_string(),
        job_context: "Backend engineer role.".to_string(),
        ..SessionConfig::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(50))
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn candidate_track() -> (mpsc::Sender<AudioFrame>, AudioTrack) {
    let (frame_tx, frames) = mpsc::channel(64);
    (
        frame_tx,
        AudioTrack {
            speaker: Speaker::Candidate,
            frames,
        },
    )
}

#[tokio::test]
async fn test_participant_never_joins_is_fatal() {
    let store = Arc::new(MemoryStore::default());
    let mut coordinator = SessionCoordinator::new(
        config(vec![question("q1", "your name")]),
        ScriptedModel::new(&[]),
        fast_retry(),
        ScriptedStt::new(&[], Duration::from_millis(10)),
        store.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(8);
    drop(events_tx);

    let result = coordinator.run(events_rx).await;

    assert!(matches!(result, Err(SessionError::ParticipantNeverJoined)));
    assert_eq!(coordinator.phase(), SessionPhase::Terminated);
    // Nothing to score, nothing persisted
    assert!(store.saves.lock().await.is_empty());
}

#[tokio::test]
async fn test_room_closed_mid_session_is_fatal_and_unflushed() {
    let store = Arc::new(MemoryStore::default());
    let mut coordinator = SessionCoordinator::new(
        config(vec![question("q1", "your name")]),
        ScriptedModel::new(&["Welcome! Please introduce yourself."]),
        fast_retry(),
        ScriptedStt::new(&[], Duration::from_millis(10)),
        store.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(8);
    events_tx
        .send(RoomEvent::ParticipantJoined {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();

    let run = tokio::spawn(async move {
        let result = coordinator.run(events_rx).await;
        (coordinator, result)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(events_tx);

    let (coordinator, result) = run.await.unwrap();
    assert!(matches!(result, Err(SessionError::RoomClosed)));
    assert_eq!(coordinator.phase(), SessionPhase::Terminated);
    // A partial transcript from a dead room is never persisted
    assert!(store.saves.lock().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_before_join_flushes_once() {
    let store = Arc::new(MemoryStore::default());
    let mut coordinator = SessionCoordinator::new(
        config(vec![]),
        ScriptedModel::new(&[]),
        fast_retry(),
        ScriptedStt::new(&[], Duration::from_millis(10)),
        store.clone(),
    );
    let shutdown = coordinator.shutdown_handle();

    let (_events_tx, events_rx) = mpsc::channel(8);
    shutdown.signal();

    coordinator.run(events_rx).await.unwrap();

    assert_eq!(coordinator.phase(), SessionPhase::Terminated);
    let saves = store.saves.lock().await;
    assert_eq!(saves.len(), 1);
    assert!(saves[0].1.is_empty());
}

#[tokio::test]
async fn test_disconnect_drains_tasks_and_flushes_exactly_once() {
    init_logging();
    let store = Arc::new(MemoryStore::default());
    let mut coordinator = SessionCoordinator::new(
        config(vec![question("q1", "your name")]),
        ScriptedModel::new(&["Welcome! Please introduce yourself."]),
        fast_retry(),
        ScriptedStt::new(&["Hello, I'm Ana."], Duration::from_millis(20)),
        store.clone(),
    );
    let shutdown = coordinator.shutdown_handle();

    let (events_tx, events_rx) = mpsc::channel(8);
    let run = tokio::spawn(async move {
        let result = coordinator.run(events_rx).await;
        (coordinator, result)
    });

    events_tx
        .send(RoomEvent::ParticipantJoined {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();

    // One live forwarding task plus the liveness monitor are running when
    // the disconnect arrives
    let (_frame_tx, track) = candidate_track();
    events_tx
        .send(RoomEvent::TrackSubscribed(track))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    events_tx
        .send(RoomEvent::ParticipantDisconnected {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();
    // A racing shutdown signal must not cause a second flush
    shutdown.signal();

    let (coordinator, result) = run.await.unwrap();
    result.unwrap();

    // Terminated only after every task has been awaited
    assert_eq!(coordinator.phase(), SessionPhase::Terminated);

    let saves = store.saves.lock().await;
    assert_eq!(saves.len(), 1, "ledger must be flushed exactly once");
    let (session_id, transcript) = &saves[0];
    assert_eq!(session_id, "test-session");
    // Opening agent turn plus the forwarded candidate utterance
    assert!(transcript.iter().any(|u| u.speaker == Speaker::Agent));
    assert!(transcript
        .iter()
        .any(|u| u.speaker == Speaker::Candidate && u.text == "Hello, I'm Ana."));
}

#[tokio::test]
async fn test_hung_model_never_wedges_the_event_loop() {
    init_logging();
    let store = Arc::new(MemoryStore::default());
    let mut coordinator = SessionCoordinator::new(
        config(vec![question("q1", "your name")]),
        Arc::new(HungModel),
        fast_retry(),
        ScriptedStt::new(&[], Duration::from_millis(10)),
        store.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(8);
    events_tx
        .send(RoomEvent::ParticipantJoined {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();
    events_tx
        .send(RoomEvent::ParticipantDisconnected {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();

    // Turn generation stalls without erroring; the attempt timeout must cut
    // it off so the disconnect is still processed and the session terminates
    let run = tokio::time::timeout(Duration::from_secs(5), coordinator.run(events_rx))
        .await
        .expect("session must terminate despite a hung model");
    run.unwrap();

    assert_eq!(coordinator.phase(), SessionPhase::Terminated);

    let saves = store.saves.lock().await;
    assert_eq!(saves.len(), 1);
    // The opening turn fell back to the hand-authored utterance
    assert!(saves[0].1.iter().any(|u| u.speaker == Speaker::Agent));
}

#[tokio::test]
async fn test_failed_forwarder_restarts_once_then_gives_up() {
    let store = Arc::new(MemoryStore::default());
    let stt = FailingStt::new();
    let mut coordinator = SessionCoordinator::new(
        config(vec![question("q1", "your name")]),
        ScriptedModel::new(&["Welcome! Please introduce yourself."]),
        fast_retry(),
        stt.clone(),
        store.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(8);
    let run = tokio::spawn(async move {
        let result = coordinator.run(events_rx).await;
        (coordinator, result)
    });

    events_tx
        .send(RoomEvent::ParticipantJoined {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();
    let (_frame_tx, track) = candidate_track();
    events_tx
        .send(RoomEvent::TrackSubscribed(track))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Initial attempt plus exactly one restart; the session survives
    assert_eq!(stt.calls.load(Ordering::SeqCst), 2);

    events_tx
        .send(RoomEvent::ParticipantDisconnected {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();

    let (coordinator, result) = run.await.unwrap();
    result.unwrap();
    assert_eq!(coordinator.phase(), SessionPhase::Terminated);
    assert_eq!(store.saves.lock().await.len(), 1);
}

#[tokio::test]
async fn test_full_interview_walks_the_script() {
    init_logging();
    let store = Arc::new(MemoryStore::default());
    let model = ScriptedModel::new(&[
        "Welcome! Please introduce yourself.",
        "What is your name?",
        "5", // sufficiency rating for the name answer
        "What are you proud of?",
        "5", // sufficiency rating for the achievement answer
        "Thank you, that's everything we needed.",
    ]);
    let stt = ScriptedStt::new(
        &["Hi, I'm Ana.", "My name is Ana.", "Shipping X."],
        Duration::from_millis(60),
    );
    let mut coordinator = SessionCoordinator::new(
        config(vec![
            question("q1", "your name"),
            question("q2", "a proud moment"),
        ]),
        model,
        fast_retry(),
        stt,
        store.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(8);
    let run = tokio::spawn(async move {
        let result = coordinator.run(events_rx).await;
        (coordinator, result)
    });

    events_tx
        .send(RoomEvent::ParticipantJoined {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();
    let (_frame_tx, track) = candidate_track();
    events_tx
        .send(RoomEvent::TrackSubscribed(track))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    events_tx
        .send(RoomEvent::ParticipantDisconnected {
            identity: "ana".to_string(),
        })
        .await
        .unwrap();

    let (coordinator, result) = run.await.unwrap();
    result.unwrap();
    assert_eq!(coordinator.phase(), SessionPhase::Terminated);

    let saves = store.saves.lock().await;
    let transcript = &saves[0].1;

    let agent_turns: Vec<&str> = transcript
        .iter()
        .filter(|u| u.speaker == Speaker::Agent)
        .map(|u| u.text.as_str())
        .collect();
    assert_eq!(
        agent_turns,
        vec![
            "Welcome! Please introduce yourself.",
            "What is your name?",
            "What are you proud of?",
            "Thank you, that's everything we needed.",
        ]
    );

    let candidate_turns: Vec<&str> = transcript
        .iter()
        .filter(|u| u.speaker == Speaker::Candidate)
        .map(|u| u.text.as_str())
        .collect();
    assert_eq!(
        candidate_turns,
        vec!["Hi, I'm Ana.", "My name is Ana.", "Shipping X."]
    );
}
