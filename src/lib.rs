pub mod audio;
pub mod config;
pub mod model;
pub mod room;
pub mod scoring;
pub mod session;
pub mod stt;
pub mod transcript;

pub use audio::{AudioForwarder, AudioFrame, AudioTrack, ForwardOutcome};
pub use config::Config;
pub use model::{ChatMessage, ChatRole, LanguageModel, OpenAiChatModel, RetryPolicy};
pub use room::RoomEvent;
pub use scoring::{ScoreRecord, ScoringEngine, ScoringError, ScoringOutcome};
pub use session::{
    ActivityClock, InterviewScript, LivenessMonitor, Question, SessionConfig,
    SessionCoordinator, SessionError, SessionPhase, SessionShutdown, Stage, TurnDriver,
    TurnObserver,
};
pub use stt::{SpeechToText, StreamConfig, TranscriptEvent};
pub use transcript::{JsonFileStore, Speaker, TranscriptLedger, TranscriptStore, Utterance};
