//! Post-session scoring
//!
//! Runs entirely outside the live session, on a persisted transcript
//! snapshot: reconstruct question/answer pairs, send one scoring request to
//! the model, validate its structured reply, and aggregate. Malformed
//! replies are hard failures; nothing partial is ever returned.

mod engine;
mod pairing;

pub use engine::{ScoreRecord, ScoringEngine, ScoringError, ScoringOutcome};
pub use pairing::{pair_questions, QaPair};
