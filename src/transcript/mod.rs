//! Session transcript management
//!
//! This module provides the append-only transcript ledger shared by every
//! task in a live session, plus the persistence seam used to flush it when
//! the session ends:
//! - Speaker-attributed, timestamped utterances
//! - Concurrent-append-safe ledger with timestamp-ordered snapshots
//! - `TranscriptStore` trait and a JSON-file implementation

mod ledger;
mod store;

pub use ledger::{Speaker, TranscriptLedger, Utterance};
pub use store::{JsonFileStore, TranscriptStore};
