//! Live interview session management
//!
//! This module provides everything that runs during a live session:
//! - The interview script state machine (Introduction → Questions → Closing)
//! - The conversational turn driver wrapping the remote language model
//! - The liveness monitor that re-engages a silent candidate
//! - The session coordinator that owns the task set and the lifecycle

mod config;
mod coordinator;
mod liveness;
mod script;
mod turns;

pub use config::SessionConfig;
pub use coordinator::{SessionCoordinator, SessionError, SessionPhase, SessionShutdown};
pub use liveness::{ActivityClock, LivenessMonitor};
pub use script::{InterviewScript, Question, Stage, CLOSING_MESSAGE};
pub use turns::{TurnDriver, TurnObserver};
