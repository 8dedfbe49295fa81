use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::model::{ChatMessage, LanguageModel};
use crate::session::Question;
use crate::transcript::Utterance;

use super::pairing::{pair_questions, QaPair};

/// One persisted per-question scoring result
///
/// Exactly the five fields the scoring contract requires; anything else in
/// the model's reply fails the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreRecord {
    /// Echoed question text
    pub question: String,
    /// Question identifier from the campaign store
    pub question_id: String,
    /// The candidate response the score applies to
    pub response: String,
    /// Why this score was awarded
    pub rationale: String,
    /// Awarded points, in `[0, max_points]` for the question
    pub score: u32,
}

/// Result of one scoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOutcome {
    pub records: Vec<ScoreRecord>,
    /// Sum of per-question scores
    pub total: u32,
    /// Sum of per-question max points
    pub max_total: u32,
}

/// Hard failures out of [`ScoringEngine::score`]
///
/// None of these yield a partial record list; the caller re-invokes scoring
/// instead of accepting a best-effort result.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring model call failed: {0}")]
    ModelCall(anyhow::Error),

    #[error("scoring reply did not parse as a score list: {reason}")]
    UnparseableReply { reason: String },

    #[error("scoring reply contained {got} record(s) for {expected} question(s)")]
    WrongRecordCount { expected: usize, got: usize },

    #[error("score {score} for question {question_id} exceeds the {max_points}-point maximum")]
    ScoreOutOfRange {
        question_id: String,
        score: u32,
        max_points: u32,
    },
}

/// Grades a finalized transcript against the campaign's rubric
///
/// Deterministic given a deterministic model: the same transcript and
/// question set produce the same records. The model is called exactly once
/// per run; a malformed reply is never silently retried or repaired.
pub struct ScoringEngine {
    model: Arc<dyn LanguageModel>,
}

impl ScoringEngine {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn score(
        &self,
        campaign_id: &str,
        questions: &[Question],
        transcript: &[Utterance],
    ) -> Result<ScoringOutcome, ScoringError> {
        let max_total = questions.iter().map(|q| q.max_points).sum();

        if questions.is_empty() {
            info!("Campaign {} has no questions; nothing to score", campaign_id);
            return Ok(ScoringOutcome {
                records: Vec::new(),
                total: 0,
                max_total,
            });
        }
        if transcript.is_empty() {
            warn!(
                "Empty transcript for campaign {}; returning an empty score set",
                campaign_id
            );
            return Ok(ScoringOutcome {
                records: Vec::new(),
                total: 0,
                max_total,
            });
        }

        let pairs = pair_questions(questions, transcript);
        let request = build_request(campaign_id, &pairs);

        let reply = self
            .model
            .complete(&request)
            .await
            .map_err(ScoringError::ModelCall)?;

        let records = parse_reply(&reply)?;
        validate(questions, &records)?;

        let total = records.iter().map(|r| r.score).sum();
        info!(
            "Scored campaign {}: {}/{} across {} question(s)",
            campaign_id,
            total,
            max_total,
            records.len()
        );

        Ok(ScoringOutcome {
            records,
            total,
            max_total,
        })
    }
}

fn build_request(campaign_id: &str, pairs: &[QaPair<'_>]) -> Vec<ChatMessage> {
    let mut body = format!(
        "Score this interview for campaign {}.\n\n",
        campaign_id
    );
    for (i, pair) in pairs.iter().enumerate() {
        let q = pair.question;
        body.push_str(&format!(
            "Question {} (id: {}, max {} points)\n\
             Prompt: {}: {}\n\
             Scoring criteria: {}\n\
             Candidate response: {}\n\n",
            i + 1,
            q.id,
            q.max_points,
            q.title,
            q.body,
            q.rubric,
            if pair.response.is_empty() {
                "(no response)"
            } else {
                pair.response.as_str()
            },
        ));
    }

    vec![
        ChatMessage::system(
            "You are grading interview answers against their scoring \
             criteria. Use graded partial credit: an answer that partially \
             satisfies a criterion earns proportionate points, never \
             all-or-nothing. When a criterion targets a numeric value and \
             the candidate states a nearby value, award points by proximity \
             rather than zero. Each score must be an integer between 0 and \
             that question's maximum points.\n\
             Reply with a bare JSON array only, one object per question in \
             order, each with exactly these keys in this order: question, \
             question_id, response, rationale, score.",
        ),
        ChatMessage::user(body),
    ]
}

fn parse_reply(reply: &str) -> Result<Vec<ScoreRecord>, ScoringError> {
    let trimmed = strip_code_fence(reply.trim());

    serde_json::from_str::<Vec<ScoreRecord>>(trimmed).map_err(|e| {
        ScoringError::UnparseableReply {
            reason: e.to_string(),
        }
    })
}

/// Accept a reply wrapped in a Markdown code fence; models do this even
/// when told not to
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n').trim_end();
    rest.strip_suffix("```").map(str::trim_end).unwrap_or(rest)
}

fn validate(questions: &[Question], records: &[ScoreRecord]) -> Result<(), ScoringError> {
    if records.len() != questions.len() {
        return Err(ScoringError::WrongRecordCount {
            expected: questions.len(),
            got: records.len(),
        });
    }

    for (question, record) in questions.iter().zip(records) {
        if record.question_id != question.id {
            warn!(
                "Score record for question {} echoes id {}",
                question.id, record.question_id
            );
        }
        // Out-of-range scores fail the run; they are never clamped
        if record.score > question.max_points {
            return Err(ScoringError::ScoreOutOfRange {
                question_id: question.id.clone(),
                score: record.score,
                max_points: question.max_points,
            });
        }
    }

    Ok(())
}
