use serde::{Deserialize, Serialize};
use tracing::info;

/// One campaign question with its scoring rubric
///
/// Supplied by the persistence layer; read-only to the session core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Question identifier from the campaign store
    pub id: String,

    /// Short title shown to the candidate
    pub title: String,

    /// Full prompt text
    pub body: String,

    /// Scoring-criteria text used at scoring time and for
    /// turn-sufficiency guidance during the session
    pub rubric: String,

    /// Maximum points awardable for this question
    pub max_points: u32,
}

/// Coarse phase of an interview session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Introduction,
    Questions,
    Closing,
}

/// Message spoken when the script reaches `Closing`
pub const CLOSING_MESSAGE: &str =
    "That covers everything we wanted to ask. Thank you for your time today; \
     the team will review your interview and get back to you soon.";

/// The fixed interview script: Introduction → Questions(0..N−1) → Closing
///
/// Holds no concurrency primitives; it is only ever advanced from the
/// session coordinator's single event loop, even though the surrounding I/O
/// is concurrent.
#[derive(Debug, Clone)]
pub struct InterviewScript {
    questions: Vec<Question>,
    stage: Stage,
    index: usize,
}

impl InterviewScript {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            stage: Stage::Introduction,
            index: 0,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Index of the current question; meaningful only in `Questions`
    pub fn question_index(&self) -> usize {
        self.index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Move to the next stage of the script
    ///
    /// Introduction → Questions(0), then through each question in order,
    /// then Closing. Calling `advance()` in Closing is a no-op, so the
    /// terminal stage is idempotent. A campaign with zero questions goes
    /// straight from Introduction to Closing.
    pub fn advance(&mut self) -> Stage {
        match self.stage {
            Stage::Introduction => {
                if self.questions.is_empty() {
                    info!("Campaign has no questions; moving straight to closing");
                    self.stage = Stage::Closing;
                } else {
                    self.stage = Stage::Questions;
                    self.index = 0;
                }
            }
            Stage::Questions => {
                if self.index + 1 < self.questions.len() {
                    self.index += 1;
                } else {
                    self.stage = Stage::Closing;
                }
            }
            Stage::Closing => {}
        }
        self.stage
    }

    /// Prompt text for the current point in the script
    ///
    /// The question title and body while in `Questions`, the fixed closing
    /// message in `Closing`, and `None` before the interview proper starts.
    pub fn current_prompt(&self) -> Option<String> {
        match self.stage {
            Stage::Introduction => None,
            Stage::Questions => {
                let q = &self.questions[self.index];
                Some(format!("{}: {}", q.title, q.body))
            }
            Stage::Closing => Some(CLOSING_MESSAGE.to_string()),
        }
    }

    /// All question prompts, for the turn driver's system instructions
    pub fn full_script(&self) -> String {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {}: {}", i + 1, q.title, q.body))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Closing
    }
}
