//! Scoring engine: maps a completed answer sequence to a single category.
//!
//! Each option carries weights toward named categories. Accumulation sums
//! those weights per category; the decision picks the highest total, and on
//! a tie the category registered first in the catalog wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::bank::QuestionBank;
use crate::error::{BankError, QuizError};

/// A terminal quiz result (a totem animal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable id referenced from option weights.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional illustration, relative to the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    pub description: String,
}

/// Per-category totals, indexed in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scores {
    totals: Vec<u32>,
}

impl Scores {
    fn zeroed(categories: usize) -> Self {
        Self {
            totals: vec![0; categories],
        }
    }

    pub fn totals(&self) -> &[u32] {
        &self.totals
    }

    /// Index of the winning category: highest total, lowest index on ties.
    pub fn winner(&self) -> usize {
        let mut best = 0;
        for (i, &total) in self.totals.iter().enumerate().skip(1) {
            if total > self.totals[best] {
                best = i;
            }
        }
        best
    }
}

/// Weight table resolved to category indices: `[question][option] -> [(category, weight)]`.
type WeightTable = Vec<Vec<Vec<(usize, u32)>>>;

/// Pure scoring over the static weight table. Holds no per-session state and
/// is safe to share across tasks.
#[derive(Debug)]
pub struct ScoringEngine {
    bank: Arc<QuestionBank>,
    categories: Vec<Category>,
    weights: WeightTable,
}

impl ScoringEngine {
    /// Build an engine, validating that every weight names a known category.
    pub fn new(bank: Arc<QuestionBank>, categories: Vec<Category>) -> Result<Self, BankError> {
        if categories.is_empty() {
            return Err(BankError::NoCategories);
        }

        let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(categories.len());
        for (i, category) in categories.iter().enumerate() {
            if index_of.insert(category.id.as_str(), i).is_some() {
                return Err(BankError::DuplicateCategory(category.id.clone()));
            }
        }

        let mut weights = Vec::with_capacity(bank.question_count());
        for (qi, question) in bank.questions().iter().enumerate() {
            let mut per_option = Vec::with_capacity(question.options.len());
            for (oi, option) in question.options.iter().enumerate() {
                let mut resolved = Vec::with_capacity(option.weights.len());
                for (category, &weight) in &option.weights {
                    let &ci = index_of.get(category.as_str()).ok_or_else(|| {
                        BankError::UnknownCategory {
                            question: qi,
                            option: oi,
                            category: category.clone(),
                        }
                    })?;
                    resolved.push((ci, weight));
                }
                per_option.push(resolved);
            }
            weights.push(per_option);
        }

        Ok(Self {
            bank,
            categories,
            weights,
        })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Sum option weights per category over a full answer sequence.
    pub fn accumulate(&self, answers: &[usize]) -> Result<Scores, QuizError> {
        let expected = self.bank.question_count();
        if answers.len() != expected {
            return Err(QuizError::InvalidAnswerSequence {
                reason: format!("expected {expected} answers, got {}", answers.len()),
            });
        }

        let mut scores = Scores::zeroed(self.categories.len());
        for (qi, &answer) in answers.iter().enumerate() {
            let options = &self.weights[qi];
            let contributions =
                options
                    .get(answer)
                    .ok_or_else(|| QuizError::InvalidAnswerSequence {
                        reason: format!(
                            "answer {answer} to question {qi} out of range ({} options)",
                            options.len()
                        ),
                    })?;
            for &(ci, weight) in contributions {
                scores.totals[ci] = scores.totals[ci].saturating_add(weight);
            }
        }
        Ok(scores)
    }

    /// Pick exactly one category from accumulated totals.
    pub fn decide(&self, scores: &Scores) -> &Category {
        &self.categories[scores.winner()]
    }

    /// Accumulate and decide in one step.
    pub fn evaluate(&self, answers: &[usize]) -> Result<&Category, QuizError> {
        let scores = self.accumulate(answers)?;
        let category = self.decide(&scores);
        tracing::debug!(
            totals = ?scores.totals(),
            category = %category.id,
            "Quiz scored"
        );
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::bank::{QuizDefinition, QuizOption, Question};

    fn category(id: &str) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            image: None,
            description: format!("{id} description"),
        }
    }

    /// Two questions, two options each, weights [1,0] / [0,1].
    fn ab_engine() -> ScoringEngine {
        let question = |text: &str| {
            Question::new(
                text,
                vec![
                    QuizOption::new("a").with_weight("a", 1),
                    QuizOption::new("b").with_weight("b", 1),
                ],
            )
        };
        let bank = QuestionBank::new(vec![question("first"), question("second")]).unwrap();
        ScoringEngine::new(Arc::new(bank), vec![category("a"), category("b")]).unwrap()
    }

    fn builtin_engine() -> ScoringEngine {
        let def = QuizDefinition::builtin().unwrap();
        let bank = Arc::new(QuestionBank::new(def.questions).unwrap());
        ScoringEngine::new(bank, def.categories).unwrap()
    }

    #[test]
    fn higher_total_wins() {
        let engine = ab_engine();
        assert_eq!(engine.accumulate(&[0, 0]).unwrap().totals(), &[2, 0]);
        assert_eq!(engine.evaluate(&[0, 0]).unwrap().id, "a");
        assert_eq!(engine.accumulate(&[1, 1]).unwrap().totals(), &[0, 2]);
        assert_eq!(engine.evaluate(&[1, 1]).unwrap().id, "b");
    }

    #[test]
    fn tie_goes_to_first_category() {
        let engine = ab_engine();
        assert_eq!(engine.accumulate(&[0, 1]).unwrap().totals(), &[1, 1]);
        assert_eq!(engine.evaluate(&[0, 1]).unwrap().id, "a");
        assert_eq!(engine.evaluate(&[1, 0]).unwrap().id, "a");
    }

    #[test]
    fn wrong_length_rejected() {
        let engine = ab_engine();
        assert!(matches!(
            engine.evaluate(&[0]),
            Err(QuizError::InvalidAnswerSequence { .. })
        ));
        assert!(matches!(
            engine.evaluate(&[0, 0, 0]),
            Err(QuizError::InvalidAnswerSequence { .. })
        ));
    }

    #[test]
    fn out_of_range_answer_rejected() {
        let engine = ab_engine();
        let err = engine.evaluate(&[0, 2]).unwrap_err();
        assert!(matches!(err, QuizError::InvalidAnswerSequence { .. }));
        assert!(err.to_string().contains("question 1"));
    }

    #[test]
    fn every_builtin_sequence_yields_one_category_deterministically() {
        let engine = builtin_engine();
        let counts: Vec<usize> = engine
            .bank
            .questions()
            .iter()
            .map(|q| q.options.len())
            .collect();

        // Odometer walk over every valid answer sequence.
        let mut answers = vec![0usize; counts.len()];
        let mut seen = std::collections::HashSet::new();
        loop {
            let first = engine.evaluate(&answers).unwrap().id.clone();
            let again = engine.evaluate(&answers).unwrap().id.clone();
            assert_eq!(first, again);
            seen.insert(first);

            let mut pos = 0;
            while pos < counts.len() {
                answers[pos] += 1;
                if answers[pos] < counts[pos] {
                    break;
                }
                answers[pos] = 0;
                pos += 1;
            }
            if pos == counts.len() {
                break;
            }
        }
        // Every animal is reachable.
        assert_eq!(seen.len(), engine.categories().len());
    }

    #[test]
    fn raising_a_total_never_makes_it_lose() {
        let scores = Scores {
            totals: vec![3, 5, 5],
        };
        assert_eq!(scores.winner(), 1);
        let raised = Scores {
            totals: vec![3, 5, 6],
        };
        assert_eq!(raised.winner(), 2);
    }

    #[test]
    fn unknown_category_rejected() {
        let bank = QuestionBank::new(vec![Question::new(
            "q",
            vec![QuizOption::new("x").with_weight("zebra", 1)],
        )])
        .unwrap();
        let err = ScoringEngine::new(Arc::new(bank), vec![category("a")]).unwrap_err();
        assert!(matches!(
            err,
            BankError::UnknownCategory { question: 0, option: 0, .. }
        ));
    }

    #[test]
    fn duplicate_category_rejected() {
        let bank = QuestionBank::new(vec![Question::new("q", vec![QuizOption::new("x")])]).unwrap();
        let err =
            ScoringEngine::new(Arc::new(bank), vec![category("a"), category("a")]).unwrap_err();
        assert!(matches!(err, BankError::DuplicateCategory(id) if id == "a"));
    }

    #[test]
    fn empty_catalog_rejected() {
        let bank = QuestionBank::new(vec![Question::new("q", vec![QuizOption::new("x")])]).unwrap();
        assert!(matches!(
            ScoringEngine::new(Arc::new(bank), vec![]),
            Err(BankError::NoCategories)
        ));
    }

    #[test]
    fn all_zero_weights_pick_first_category() {
        let bank = QuestionBank::new(vec![Question::new("q", vec![QuizOption::new("x")])]).unwrap();
        let engine =
            ScoringEngine::new(Arc::new(bank), vec![category("a"), category("b")]).unwrap();
        assert_eq!(engine.evaluate(&[0]).unwrap().id, "a");
    }
}
