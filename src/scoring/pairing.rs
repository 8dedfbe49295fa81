use tracing::warn;

use crate::session::Question;
use crate::transcript::{Speaker, Utterance};

/// A reconstructed question/answer association
///
/// Built fresh for each scoring run; never persisted on its own.
#[derive(Debug, Clone)]
pub struct QaPair<'a> {
    pub question: &'a Question,
    pub response: String,
}

/// Reconstruct Q&A pairs from a finalized transcript
///
/// Question boundaries are found with a best-effort heuristic carried over
/// from the product: an agent utterance containing a question mark opens the
/// next answer, and candidate utterances accumulate into the open answer
/// until the next boundary. Two known misattributions follow: a rhetorical
/// agent question opens a spurious boundary, and so does an elaboration
/// follow-up, which shifts the elaborated part of an answer onto the next
/// question. Treat the output as approximate, not parsed ground truth.
///
/// Candidate speech before the first boundary, and answers to boundaries
/// beyond the question list, are discarded with a log. Questions with no
/// matching boundary get an empty response.
pub fn pair_questions<'a>(
    questions: &'a [Question],
    transcript: &[Utterance],
) -> Vec<QaPair<'a>> {
    let mut answers: Vec<Vec<&str>> = Vec::new();
    let mut unanchored = 0usize;

    for utterance in transcript {
        match utterance.speaker {
            Speaker::Agent => {
                if utterance.text.contains('?') {
                    answers.push(Vec::new());
                }
            }
            Speaker::Candidate => match answers.last_mut() {
                Some(current) => current.push(&utterance.text),
                None => unanchored += 1,
            },
        }
    }

    if unanchored > 0 {
        warn!(
            "Discarded {} candidate utterance(s) preceding the first question boundary",
            unanchored
        );
    }
    if answers.len() > questions.len() {
        let extra: usize = answers[questions.len()..].iter().map(|a| a.len()).sum();
        if extra > 0 {
            warn!(
                "Discarded {} candidate utterance(s) matched to boundaries beyond the question list",
                extra
            );
        }
    }

    questions
        .iter()
        .enumerate()
        .map(|(i, question)| QaPair {
            question,
            response: answers.get(i).map(|a| a.join(" ")).unwrap_or_default(),
        })
        .collect()
}
