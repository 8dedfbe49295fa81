use std::sync::Arc;
use tracing::{info, warn};

use crate::model::{ChatMessage, LanguageModel, RetryPolicy};
use crate::transcript::{Speaker, TranscriptLedger, Utterance};

use super::liveness::ActivityClock;

/// Observer of agent turns
///
/// Everything that needs to see generated turns (the transcript ledger, the
/// activity clock) implements this instead of intercepting the model client.
#[async_trait::async_trait]
pub trait TurnObserver: Send + Sync {
    async fn on_turn(&self, utterance: &Utterance);
}

#[async_trait::async_trait]
impl TurnObserver for TranscriptLedger {
    async fn on_turn(&self, utterance: &Utterance) {
        self.append_at(utterance.clone()).await;
    }
}

#[async_trait::async_trait]
impl TurnObserver for ActivityClock {
    async fn on_turn(&self, _utterance: &Utterance) {
        self.touch();
    }
}

/// Hand-authored openers used when the model is unreachable
const FALLBACK_INTRODUCTION: &str =
    "Hello, and welcome to your interview. I'll be asking you a few questions \
     about your background and experience. Whenever you're ready, please \
     introduce yourself briefly.";

const FALLBACK_ELABORATION: &str =
    "Thanks. Could you tell me a little more about that, with a concrete example?";

const FALLBACK_REENGAGEMENT: &str =
    "Take your time. Whenever you're ready, go ahead and continue with your answer.";

/// Minimum 1-5 sufficiency rating at which the interview advances
const SUFFICIENT_RATING: u8 = 3;

/// Generates the agent's conversational turns
///
/// Wraps the remote language model with the interview script, resume and job
/// context, and the rubric-derived turn-sufficiency guidance. Generation
/// failures are retried through the shared [`RetryPolicy`]; when the budget
/// is spent, a hand-authored fallback is used so the session never stalls
/// silently. Every produced turn, model-generated or fallback, is delivered
/// to every registered observer tagged as the agent.
pub struct TurnDriver {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    system_prompt: String,
    history: Vec<ChatMessage>,
    observers: Vec<Arc<dyn TurnObserver>>,
}

impl TurnDriver {
    /// Build a driver for one session
    ///
    /// `script_text` lists every question prompt; `resume_text` and
    /// `job_context` ground the conversation in the candidate and role.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retry: RetryPolicy,
        script_text: &str,
        resume_text: &str,
        job_context: &str,
    ) -> Self {
        let system_prompt = format!(
            "You are a professional, friendly interviewer conducting a live \
             spoken interview. Keep every reply short and conversational; it \
             will be spoken aloud to the candidate.\n\n\
             Interview script (ask these in order, one at a time):\n{}\n\n\
             Role being interviewed for:\n{}\n\n\
             Candidate resume:\n{}\n\n\
             When judging whether an answer is sufficient, rate it 1-5 \
             against the question's criteria: 1 means no usable answer, 3 \
             means adequate, 5 means thorough. This rating only decides \
             whether to ask for elaboration or move on; it is never a final \
             score.",
            script_text, job_context, resume_text
        );

        Self {
            model,
            retry,
            system_prompt,
            history: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Register an observer for every turn this driver produces
    pub fn add_observer(&mut self, observer: Arc<dyn TurnObserver>) {
        self.observers.push(observer);
    }

    /// Record a candidate utterance in the conversation history
    pub fn note_candidate(&mut self, text: &str) {
        self.history.push(ChatMessage::user(text));
    }

    /// The agent's opening turn after the participant joins
    pub async fn opening_turn(&mut self) -> Utterance {
        self.produce(
            "Greet the candidate, explain how the interview will go, and \
             invite them to briefly introduce themselves."
                .to_string(),
            FALLBACK_INTRODUCTION,
        )
        .await
    }

    /// Ask (or transition to) the given script prompt
    pub async fn question_turn(&mut self, prompt: &str) -> Utterance {
        let instruction = format!(
            "Acknowledge the candidate's last answer in one short sentence, \
             then ask the following, in your own words:\n{}",
            prompt
        );
        // The raw prompt is a serviceable spoken turn on its own
        self.produce(instruction, prompt).await
    }

    /// Ask the candidate to expand on an insufficient answer
    pub async fn elaboration_turn(&mut self) -> Utterance {
        self.produce(
            "The candidate's answer did not fully cover the question's \
             criteria. Ask one short follow-up that draws out the missing \
             detail, without revealing the criteria."
                .to_string(),
            FALLBACK_ELABORATION,
        )
        .await
    }

    /// Re-engage a candidate who has gone quiet
    pub async fn reengagement_turn(&mut self) -> Utterance {
        self.produce(
            "The candidate has been silent for a while. Gently check in and \
             encourage them to continue, repeating the current question if \
             that helps."
                .to_string(),
            FALLBACK_REENGAGEMENT,
        )
        .await
    }

    /// Rate the candidate's answer 1-5 against the question's rubric
    ///
    /// Used only to decide elaborate-vs-advance; the post-session scoring
    /// engine produces the real score. An unusable or unreachable rating
    /// defaults to "adequate" so the interview keeps moving.
    pub async fn assess_answer(&self, rubric: &str, answer: &str) -> u8 {
        let messages = vec![
            ChatMessage::system(
                "Rate how sufficiently an interview answer addresses the \
                 given criteria, on a scale of 1 (no usable answer) to 5 \
                 (thorough). Reply with the single digit only."
                    .to_string(),
            ),
            ChatMessage::user(format!("Criteria:\n{}\n\nAnswer:\n{}", rubric, answer)),
        ];

        let model = Arc::clone(&self.model);
        let reply = self
            .retry
            .run("answer sufficiency rating", || {
                let model = Arc::clone(&model);
                let messages = messages.clone();
                async move { model.complete(&messages).await }
            })
            .await;

        match reply {
            Ok(text) => match text.trim().chars().find(|c| ('1'..='5').contains(c)) {
                Some(digit) => digit as u8 - b'0',
                None => {
                    warn!("Unusable sufficiency rating {:?}; treating as adequate", text);
                    SUFFICIENT_RATING
                }
            },
            Err(e) => {
                warn!("Sufficiency rating failed: {}; treating as adequate", e);
                SUFFICIENT_RATING
            }
        }
    }

    /// Whether a 1-5 rating is enough to advance the script
    pub fn is_sufficient(rating: u8) -> bool {
        rating >= SUFFICIENT_RATING
    }

    /// Generate one agent turn, falling back to `fallback` on exhaustion
    async fn produce(&mut self, instruction: String, fallback: &str) -> Utterance {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(instruction));

        let model = Arc::clone(&self.model);
        let text = match self
            .retry
            .run("turn generation", || {
                let model = Arc::clone(&model);
                let messages = messages.clone();
                async move { model.complete(&messages).await }
            })
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Turn generation exhausted retries ({}); using fallback utterance",
                    e
                );
                fallback.to_string()
            }
        };

        info!("Agent turn: {}", text);
        self.history.push(ChatMessage::assistant(text.clone()));

        let utterance = Utterance::new(Speaker::Agent, text);
        futures::future::join_all(self.observers.iter().map(|o| o.on_turn(&utterance))).await;
        utterance
    }
}
