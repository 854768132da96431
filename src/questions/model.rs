//! Question payloads and normalization
//!
//! Questions arrive from clients and from the generation backend in slightly
//! different shapes. Everything is normalized into [`Question`], whose correct
//! answer is stored as the option text itself.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A question ready to be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl Question {
    /// Exact text comparison against the correct option
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}

/// Correct answer as supplied: either the option text or its index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(usize),
    Text(String),
}

/// Question as received over the wire, before normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(alias = "prompt", alias = "text")]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    pub correct: CorrectAnswer,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl RawQuestion {
    /// Normalize into a playable question
    ///
    /// Option texts are trimmed and de-duplicated so that a text match can
    /// only ever point at one option. Returns `None` when fewer than two
    /// options remain or the correct answer does not name an option.
    pub fn normalize(&self) -> Option<Question> {
        let prompt = self.question.trim();
        if prompt.is_empty() {
            return None;
        }

        let trimmed: Vec<String> = self
            .options
            .iter()
            .map(|option| option.trim().to_string())
            .collect();

        let correct = match &self.correct {
            CorrectAnswer::Index(index) => trimmed.get(*index).cloned()?,
            CorrectAnswer::Text(text) => text.trim().to_string(),
        };

        let mut options: Vec<String> = Vec::with_capacity(trimmed.len());
        for option in trimmed {
            if !option.is_empty() && !options.contains(&option) {
                options.push(option);
            }
        }

        if options.len() < 2 || !options.contains(&correct) {
            return None;
        }

        Some(Question {
            prompt: prompt.to_string(),
            options,
            correct_answer: correct,
            explanation: non_empty(&self.explanation),
            category: non_empty(&self.category),
            difficulty: non_empty(&self.difficulty),
        })
    }
}

impl From<Question> for RawQuestion {
    fn from(question: Question) -> Self {
        Self {
            question: question.prompt,
            options: question.options,
            correct: CorrectAnswer::Text(question.correct_answer),
            explanation: question.explanation,
            category: question.category,
            difficulty: question.difficulty,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalize a batch, silently dropping unusable questions
pub fn normalize_questions(raw: &[RawQuestion]) -> Vec<Question> {
    let questions: Vec<Question> = raw.iter().filter_map(RawQuestion::normalize).collect();
    if questions.len() < raw.len() {
        debug!(
            "Dropped {} of {} questions during normalization",
            raw.len() - questions.len(),
            raw.len()
        );
    }
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(options: &[&str], correct: CorrectAnswer) -> RawQuestion {
        RawQuestion {
            question: "Capital of France?".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct,
            explanation: None,
            category: Some("geography".to_string()),
            difficulty: None,
        }
    }

    #[test]
    fn test_text_answer_is_kept() {
        let question = raw(&["Paris", "London"], CorrectAnswer::Text("Paris".into()))
            .normalize()
            .unwrap();
        assert_eq!(question.correct_answer, "Paris");
        assert!(question.is_correct("Paris"));
        assert!(!question.is_correct("paris"));
    }

    #[test]
    fn test_index_answer_resolves_to_text() {
        let question = raw(&["Paris", "London", "Rome"], CorrectAnswer::Index(2))
            .normalize()
            .unwrap();
        assert_eq!(question.correct_answer, "Rome");
    }

    #[test]
    fn test_duplicate_options_are_collapsed() {
        let question = raw(&["Paris", " Paris", "London"], CorrectAnswer::Index(1))
            .normalize()
            .unwrap();
        assert_eq!(question.options, vec!["Paris", "London"]);
        assert_eq!(question.correct_answer, "Paris");
    }

    #[test]
    fn test_unusable_questions_are_dropped() {
        assert!(raw(&["Paris"], CorrectAnswer::Index(0)).normalize().is_none());
        assert!(raw(&["Paris", "London"], CorrectAnswer::Text("Berlin".into()))
            .normalize()
            .is_none());
        assert!(raw(&["Paris", "London"], CorrectAnswer::Index(5))
            .normalize()
            .is_none());
    }

    #[test]
    fn test_accepts_client_shapes() {
        let json = serde_json::json!([
            {"question": "Q1", "options": ["Paris", "London"], "correct": "Paris"},
            {"prompt": "Q2", "options": ["A", "B"], "correctAnswer": 1},
            {"text": "Q3", "options": ["A", "B"], "answer": "A", "explanation": "because"}
        ]);
        let raw: Vec<RawQuestion> = serde_json::from_value(json).unwrap();
        let questions = normalize_questions(&raw);
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[1].correct_answer, "B");
        assert_eq!(questions[2].explanation.as_deref(), Some("because"));
    }
}
