//! Question bank: the ordered, immutable catalog of quiz questions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::scoring::Category;
use crate::error::{BankError, QuizError};

/// Quiz definition compiled into the binary.
const DEFAULT_DEFINITION: &str = include_str!("../../data/quiz.json");

/// A selectable answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    /// Button text.
    pub label: String,
    /// Score increments keyed by category id. Missing categories score 0.
    #[serde(default)]
    pub weights: BTreeMap<String, u32>,
}

impl QuizOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            weights: BTreeMap::new(),
        }
    }

    /// Add a weight toward a category.
    pub fn with_weight(mut self, category: impl Into<String>, weight: u32) -> Self {
        self.weights.insert(category.into(), weight);
        self
    }
}

/// A single quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<QuizOption>,
}

impl Question {
    pub fn new(text: impl Into<String>, options: Vec<QuizOption>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    /// Look up an option by index.
    pub fn option_at(&self, index: usize) -> Result<&QuizOption, QuizError> {
        self.options.get(index).ok_or(QuizError::OutOfRange {
            what: "option",
            index,
            len: self.options.len(),
        })
    }
}

/// On-disk quiz definition: questions plus the categories they score toward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub categories: Vec<Category>,
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    /// Parse a definition from JSON text.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a definition from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, BankError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// The definition shipped with the bot.
    pub fn builtin() -> Result<Self, BankError> {
        Self::from_json(DEFAULT_DEFINITION)
    }
}

/// Ordered, immutable list of questions. Never written after construction,
/// so it is shared behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, rejecting an empty list or a question with no options.
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        if let Some(question) = questions.iter().position(|q| q.options.is_empty()) {
            return Err(BankError::NoOptions { question });
        }
        Ok(Self { questions })
    }

    /// Question at `index`, or `OutOfRange` outside `[0, N)`.
    pub fn question_at(&self, index: usize) -> Result<&Question, QuizError> {
        self.questions.get(index).ok_or(QuizError::OutOfRange {
            what: "question",
            index,
            len: self.questions.len(),
        })
    }

    /// Number of questions, fixed at construction.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_option_question(text: &str) -> Question {
        Question::new(
            text,
            vec![
                QuizOption::new("yes").with_weight("a", 1),
                QuizOption::new("no").with_weight("b", 1),
            ],
        )
    }

    #[test]
    fn builtin_definition_parses() {
        let def = QuizDefinition::builtin().unwrap();
        assert!(!def.categories.is_empty());
        let bank = QuestionBank::new(def.questions).unwrap();
        assert_eq!(bank.question_count(), 5);
        for q in bank.questions() {
            assert_eq!(q.options.len(), 4);
        }
    }

    #[test]
    fn question_at_bounds() {
        let bank = QuestionBank::new(vec![two_option_question("q0"), two_option_question("q1")])
            .unwrap();
        assert_eq!(bank.question_at(1).unwrap().text, "q1");
        assert_eq!(
            bank.question_at(2).unwrap_err(),
            QuizError::OutOfRange {
                what: "question",
                index: 2,
                len: 2
            }
        );
    }

    #[test]
    fn option_at_bounds() {
        let q = two_option_question("q");
        assert_eq!(q.option_at(0).unwrap().label, "yes");
        assert!(matches!(
            q.option_at(5),
            Err(QuizError::OutOfRange { what: "option", index: 5, len: 2 })
        ));
    }

    #[test]
    fn empty_bank_rejected() {
        assert!(matches!(QuestionBank::new(vec![]), Err(BankError::Empty)));
    }

    #[test]
    fn question_without_options_rejected() {
        let result = QuestionBank::new(vec![
            two_option_question("ok"),
            Question::new("broken", vec![]),
        ]);
        assert!(matches!(result, Err(BankError::NoOptions { question: 1 })));
    }

    #[test]
    fn weights_default_to_empty() {
        let json = r#"{
            "categories": [{"id": "a", "name": "A", "description": "first"}],
            "questions": [{"text": "q", "options": [{"label": "x"}]}]
        }"#;
        let def = QuizDefinition::from_json(json).unwrap();
        assert!(def.questions[0].options[0].weights.is_empty());
        assert!(def.categories[0].image.is_none());
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            QuizDefinition::from_json("{ not json"),
            Err(BankError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn load_missing_file() {
        let result = QuizDefinition::load(Path::new("/nonexistent/quiz.json")).await;
        assert!(matches!(result, Err(BankError::Io(_))));
    }
}
