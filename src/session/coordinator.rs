use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::audio::{AudioForwarder, AudioTrack, ForwardOutcome};
use crate::model::{LanguageModel, RetryPolicy};
use crate::room::RoomEvent;
use crate::stt::SpeechToText;
use crate::transcript::{Speaker, TranscriptLedger, TranscriptStore, Utterance};

use super::config::SessionConfig;
use super::liveness::{ActivityClock, LivenessMonitor};
use super::script::{InterviewScript, Stage};
use super::turns::TurnDriver;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the participant to join
    Connecting,
    /// Interview in progress
    Active,
    /// Draining tasks and flushing the transcript
    Closing,
    /// All tasks drained; the session is over
    Terminated,
}

/// Hard failures out of [`SessionCoordinator::run`]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("participant never joined the session")]
    ParticipantNeverJoined,

    #[error("room connection lost mid-session")]
    RoomClosed,

    #[error("failed to persist transcript: {0}")]
    Persist(anyhow::Error),
}

/// Handle for requesting an orderly shutdown from outside the session
#[derive(Clone)]
pub struct SessionShutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionShutdown {
    /// Request shutdown; signals beyond the first are no-ops
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

/// Owns one live interview session end to end
///
/// Wires the transcript ledger, turn driver, liveness monitor, and one audio
/// forwarding task per subscribed track, then drives the lifecycle
/// `Connecting → Active → Closing → Terminated`. Cancellation is cooperative
/// and awaited: the coordinator reaches `Terminated` only after every task
/// it started has finished, and the ledger is flushed to the store exactly
/// once, on the first disconnect or shutdown signal.
pub struct SessionCoordinator {
    config: SessionConfig,
    script: InterviewScript,
    ledger: TranscriptLedger,
    driver: Arc<Mutex<TurnDriver>>,
    stt: Arc<dyn SpeechToText>,
    store: Arc<dyn TranscriptStore>,
    activity: ActivityClock,
    shutdown_tx: Arc<watch::Sender<bool>>,
    phase: SessionPhase,
    flushed: bool,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        model: Arc<dyn LanguageModel>,
        retry: RetryPolicy,
        stt: Arc<dyn SpeechToText>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        let script = InterviewScript::new(config.questions.clone());
        let ledger = TranscriptLedger::new();
        let activity = ActivityClock::new();

        let mut driver = TurnDriver::new(
            model,
            retry,
            &script.full_script(),
            &config.resume_text,
            &config.job_context,
        );
        driver.add_observer(Arc::new(ledger.clone()));
        driver.add_observer(Arc::new(activity.clone()));

        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            script,
            ledger,
            driver: Arc::new(Mutex::new(driver)),
            stt,
            store,
            activity,
            shutdown_tx: Arc::new(shutdown_tx),
            phase: SessionPhase::Connecting,
            flushed: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn ledger(&self) -> &TranscriptLedger {
        &self.ledger
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Handle for requesting shutdown from another task
    pub fn shutdown_handle(&self) -> SessionShutdown {
        SessionShutdown {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Run the session to completion
    ///
    /// Consumes room events until the participant disconnects, a shutdown is
    /// requested, or the event stream dies. On the two failure paths
    /// (participant never joined, room closed mid-session) the transcript is
    /// not flushed; there is nothing valid to score.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<RoomEvent>,
    ) -> Result<(), SessionError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        // A subscriber marks the current value as seen, so a signal sent
        // before run() started would never fire changed()
        if *shutdown_rx.borrow() {
            info!("Shutdown already requested; session never started");
            self.flush().await?;
            self.phase = SessionPhase::Terminated;
            return Ok(());
        }

        info!(
            "Session {} (campaign {}) waiting for participant",
            self.config.session_id, self.config.campaign_id
        );

        // Connecting: wait for the join event
        let identity = loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_ok() && *shutdown_rx.borrow() {
                        info!("Shutdown requested before participant joined");
                        self.flush().await?;
                        self.phase = SessionPhase::Terminated;
                        return Ok(());
                    }
                }
                event = events.recv() => match event {
                    Some(RoomEvent::ParticipantJoined { identity }) => break identity,
                    Some(RoomEvent::TrackSubscribed(_)) => {
                        warn!("Track subscribed before participant join; ignoring");
                    }
                    Some(RoomEvent::ParticipantDisconnected { .. }) => {
                        warn!("Disconnect event before participant join; ignoring");
                    }
                    None => {
                        self.phase = SessionPhase::Terminated;
                        return Err(SessionError::ParticipantNeverJoined);
                    }
                }
            }
        };

        self.phase = SessionPhase::Active;
        info!(
            "Participant {} joined session {}",
            identity, self.config.session_id
        );

        let liveness = LivenessMonitor::spawn(
            Arc::clone(&self.driver),
            self.activity.clone(),
            self.config.liveness_check_interval,
            self.config.idle_timeout,
            self.shutdown_tx.subscribe(),
        );

        // The coordinator keeps one sender alive so the receiver never
        // closes while forwarders come and go
        let (utterance_tx, mut utterance_rx) = mpsc::channel::<Utterance>(64);

        self.driver.lock().await.opening_turn().await;

        let mut forwarders: JoinSet<(u64, Speaker, ForwardOutcome)> = JoinSet::new();
        let mut restarted: HashSet<u64> = HashSet::new();
        let mut next_track_id: u64 = 0;

        // Active: consume room events, candidate utterances, and task exits
        let outcome = loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_ok() && *shutdown_rx.borrow() {
                        info!("Shutdown requested for session {}", self.config.session_id);
                        break Ok(());
                    }
                }

                event = events.recv() => match event {
                    Some(RoomEvent::ParticipantJoined { identity }) => {
                        warn!("Duplicate join event for {}; ignoring", identity);
                    }
                    Some(RoomEvent::TrackSubscribed(track)) => {
                        let id = next_track_id;
                        next_track_id += 1;
                        info!("Audio track {} subscribed ({:?})", id, track.speaker);
                        self.spawn_forwarder(&mut forwarders, id, track, utterance_tx.clone());
                    }
                    Some(RoomEvent::ParticipantDisconnected { identity }) => {
                        info!(
                            "Participant {} disconnected from session {}",
                            identity, self.config.session_id
                        );
                        break Ok(());
                    }
                    None => {
                        warn!("Room event stream closed without a disconnect event");
                        break Err(SessionError::RoomClosed);
                    }
                },

                Some(utterance) = utterance_rx.recv() => {
                    if utterance.speaker == Speaker::Candidate {
                        self.handle_candidate(&utterance.text).await;
                    }
                }

                Some(joined) = forwarders.join_next(), if !forwarders.is_empty() => {
                    match joined {
                        Ok((id, speaker, ForwardOutcome::StreamFailed(frames))) => {
                            if restarted.insert(id) {
                                warn!(
                                    "Forwarding for track {} ({:?}) failed; restarting once",
                                    id, speaker
                                );
                                let track = AudioTrack { speaker, frames };
                                self.spawn_forwarder(
                                    &mut forwarders,
                                    id,
                                    track,
                                    utterance_tx.clone(),
                                );
                            } else {
                                error!(
                                    "Forwarding for track {} ({:?}) failed again; \
                                     continuing without this audio source",
                                    id, speaker
                                );
                            }
                        }
                        Ok((id, speaker, ForwardOutcome::SourceClosed)) => {
                            info!("Track {} ({:?}) ended", id, speaker);
                        }
                        Ok((_, _, ForwardOutcome::Cancelled)) => {}
                        Err(e) => {
                            error!("Forwarding task panicked: {}", e);
                        }
                    }
                }
            }
        };

        // Closing: signal every task and wait for the full drain before
        // touching the store
        self.phase = SessionPhase::Closing;
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = liveness.await {
            error!("Liveness monitor panicked: {}", e);
        }
        while let Some(joined) = forwarders.join_next().await {
            if let Err(e) = joined {
                error!("Forwarding task panicked during drain: {}", e);
            }
        }

        let result = match outcome {
            Ok(()) => {
                self.flush().await?;
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.phase = SessionPhase::Terminated;
        info!("Session {} terminated", self.config.session_id);
        result
    }

    fn spawn_forwarder(
        &self,
        forwarders: &mut JoinSet<(u64, Speaker, ForwardOutcome)>,
        id: u64,
        track: AudioTrack,
        utterance_tx: mpsc::Sender<Utterance>,
    ) {
        let speaker = track.speaker;
        let stt = Arc::clone(&self.stt);
        let ledger = self.ledger.clone();
        let activity = self.activity.clone();
        let shutdown = self.shutdown_tx.subscribe();

        forwarders.spawn(async move {
            let outcome =
                AudioForwarder::run(track, stt, ledger, activity, utterance_tx, shutdown).await;
            (id, speaker, outcome)
        });
    }

    /// React to one finalized candidate utterance
    ///
    /// This is the only place the interview script advances, so script
    /// transitions are serialized through the coordinator's event loop even
    /// though the surrounding I/O is concurrent.
    async fn handle_candidate(&mut self, text: &str) {
        let mut driver = self.driver.lock().await;
        driver.note_candidate(text);

        match self.script.stage() {
            Stage::Introduction => {
                self.script.advance();
                if let Some(prompt) = self.script.current_prompt() {
                    driver.question_turn(&prompt).await;
                }
            }
            Stage::Questions => {
                let question = &self.script.questions()[self.script.question_index()];
                let rating = driver.assess_answer(&question.rubric, text).await;
                if TurnDriver::is_sufficient(rating) {
                    self.script.advance();
                    if let Some(prompt) = self.script.current_prompt() {
                        driver.question_turn(&prompt).await;
                    }
                } else {
                    info!(
                        "Answer rated {} on question {}; asking for elaboration",
                        rating,
                        self.script.question_index()
                    );
                    driver.elaboration_turn().await;
                }
            }
            Stage::Closing => {
                // Interview already wrapped up; the candidate is free to
                // keep talking but the script no longer reacts
            }
        }
    }

    /// Flush the ledger to durable storage; later calls are no-ops
    async fn flush(&mut self) -> Result<(), SessionError> {
        if self.flushed {
            info!(
                "Transcript for session {} already flushed",
                self.config.session_id
            );
            return Ok(());
        }

        let snapshot = self.ledger.snapshot().await;
        self.store
            .save(&self.config.session_id, &snapshot)
            .await
            .map_err(SessionError::Persist)?;
        self.flushed = true;
        Ok(())
    }
}
