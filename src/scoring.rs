use std::fmt::Display;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::answer_key::AnswerKey;
use crate::types::{MarkedAnswers, OrderedMap, SubjectName};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub total: u32,
    /// Correct answers per subject, in answer key order.
    pub subject_scores: OrderedMap<SubjectName, u32>,
}

/// A key entry that could not be scored. The rest of the sheet is still
/// scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ScoreWarning {
    #[serde(rename_all = "camelCase", rename = "malformed-key-entry")]
    MalformedKeyEntry {
        subject: SubjectName,
        question: String,
        reason: String,
    },
}

impl Display for ScoreWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreWarning::MalformedKeyEntry {
                subject,
                question,
                reason,
            } => write!(f, "cannot score {} question {:?}: {}", subject, question, reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSheet {
    pub result: ScoreResult,
    pub warnings: Vec<ScoreWarning>,
}

/// Parses a question id the way it is written in answer keys: surrounding
/// whitespace and a leading `+` are allowed.
fn parse_question_number(question: &str) -> Option<u32> {
    let trimmed = question.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Counts marked answers that agree with the key, per subject and in total.
/// Options are compared case-insensitively. Unanswered questions earn
/// nothing; unusable key entries earn nothing and produce a warning.
pub fn score_answers(marked: &MarkedAnswers, key: &AnswerKey) -> ScoredSheet {
    let mut scored = ScoredSheet::default();

    for (subject, answers) in &key.subjects {
        let mut correct = 0;
        for (question, expected) in answers {
            let malformed = |reason: String| ScoreWarning::MalformedKeyEntry {
                subject: subject.clone(),
                question: question.clone(),
                reason,
            };

            let number = match parse_question_number(question) {
                Some(number) => number,
                None => {
                    scored
                        .warnings
                        .push(malformed("question id is not a number".to_string()));
                    continue;
                }
            };

            let expected = match expected.as_str() {
                Some(expected) => expected,
                None => {
                    scored
                        .warnings
                        .push(malformed(format!("correct option {} is not a string", expected)));
                    continue;
                }
            };

            match marked.get(&number) {
                Some(option) if option.to_uppercase().eq(expected.to_uppercase().chars()) => {
                    correct += 1;
                }
                Some(_) => {}
                None => debug!("{} question {} unanswered", subject, number),
            }
        }

        scored.result.subject_scores.insert(subject.clone(), correct);
        scored.result.total += correct;
    }

    for warning in &scored.warnings {
        warn!("{}", warning);
    }

    scored
}
