//! Conversation controller: drives one quiz run per identity.
//!
//! States: `Idle` → `AwaitingAnswer(0..N)` → completed (result emitted,
//! session deleted, back to `Idle`). A start event resets from any state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{Level, debug, error, info, warn};

use super::bank::{QuestionBank, QuizDefinition};
use super::scoring::{Category, ScoringEngine};
use super::selector::Selector;
use super::session::{Identity, SessionStore};
use crate::error::{BankError, QuizError};

/// Where an identity currently is in the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    Idle,
    AwaitingAnswer(usize),
}

/// One answer button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptOption {
    pub label: String,
    pub selector: Selector,
}

/// A question ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPayload {
    pub question_index: usize,
    pub question_count: usize,
    pub text: String,
    pub options: Vec<PromptOption>,
}

/// The final quiz result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultPayload {
    pub category_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    pub description: String,
}

impl From<&Category> for ResultPayload {
    fn from(category: &Category) -> Self {
        Self {
            category_id: category.id.clone(),
            name: category.name.clone(),
            image: category.image.clone(),
            description: category.description.clone(),
        }
    }
}

/// Outcome of an answer: the next question, or the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizReply {
    Prompt(PromptPayload),
    Result(ResultPayload),
}

/// One async mutex per identity. Unrelated identities never share a lock.
#[derive(Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<Identity, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    pub async fn lock(&self, identity: &Identity) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(identity.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget locks nobody is holding or waiting on. Returns the number removed.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The quiz state machine. Sole writer of the session store.
pub struct QuizController {
    bank: Arc<QuestionBank>,
    engine: Arc<ScoringEngine>,
    store: Arc<SessionStore>,
    locks: IdentityLocks,
}

impl QuizController {
    pub fn new(bank: Arc<QuestionBank>, engine: Arc<ScoringEngine>) -> Arc<Self> {
        let store = SessionStore::new(Arc::clone(&bank));
        Arc::new(Self {
            bank,
            engine,
            store,
            locks: IdentityLocks::new(),
        })
    }

    /// Build the bank, engine and controller from a quiz definition.
    pub fn from_definition(definition: QuizDefinition) -> Result<Arc<Self>, BankError> {
        let bank = Arc::new(QuestionBank::new(definition.questions)?);
        let engine = Arc::new(ScoringEngine::new(Arc::clone(&bank), definition.categories)?);
        Ok(Self::new(bank, engine))
    }

    pub fn bank(&self) -> &Arc<QuestionBank> {
        &self.bank
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Current state for `identity`.
    pub async fn state(&self, identity: &Identity) -> QuizState {
        match self.store.current_question_index(identity).await {
            Ok(index) => QuizState::AwaitingAnswer(index),
            Err(_) => QuizState::Idle,
        }
    }

    /// Start (or restart) a quiz and return the first question.
    pub async fn on_start(&self, identity: &Identity) -> Result<PromptPayload, QuizError> {
        let _guard = self.locks.lock(identity).await;
        self.store.start_session(identity).await;
        info!(identity = %identity, "Quiz started");
        self.prompt(0)
    }

    /// Abandon any quiz in progress. Returns whether one was running.
    pub async fn cancel(&self, identity: &Identity) -> bool {
        let _guard = self.locks.lock(identity).await;
        let Some(session) = self.store.end_session(identity).await else {
            return false;
        };
        info!(
            identity = %identity,
            answered = session.answers.len(),
            elapsed_secs = session.elapsed().num_seconds(),
            "Quiz cancelled"
        );
        true
    }

    /// Apply an answer and return the next question or the final result.
    pub async fn on_answer(
        &self,
        identity: &Identity,
        selector: Selector,
    ) -> Result<QuizReply, QuizError> {
        let _guard = self.locks.lock(identity).await;

        let current = self.store.current_question_index(identity).await?;
        if selector.question != current {
            return Err(QuizError::StaleAnswer {
                expected: current,
                got: selector.question,
            });
        }

        let answered = self.store.record_answer(identity, selector.option).await?;
        if answered < self.bank.question_count() {
            return self.prompt(answered).map(QuizReply::Prompt);
        }

        let answers = self.store.answers(identity).await?;
        let outcome = self.engine.evaluate(&answers).map(ResultPayload::from);
        let finished = self.store.end_session(identity).await;

        let result = outcome?;
        info!(
            identity = %identity,
            category = %result.category_id,
            elapsed_secs = finished.map(|s| s.elapsed().num_seconds()),
            "Quiz completed"
        );
        Ok(QuizReply::Result(result))
    }

    /// Start a quiz, logging instead of returning errors.
    pub async fn handle_start(&self, identity: &Identity) -> Option<PromptPayload> {
        match self.on_start(identity).await {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                log_recovered(identity, &e);
                None
            }
        }
    }

    /// Apply a raw selector token. Every quiz error stops here; `None` means
    /// the action was dropped.
    pub async fn handle_answer(&self, identity: &Identity, token: &str) -> Option<QuizReply> {
        let result = match token.parse::<Selector>() {
            Ok(selector) => self.on_answer(identity, selector).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(reply) => Some(reply),
            Err(e) => {
                log_recovered(identity, &e);
                None
            }
        }
    }

    /// Drop idle sessions and unused identity locks.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let expired = self.store.expire_idle(max_idle).await;
        let pruned = self.locks.prune();
        if pruned > 0 {
            debug!(count = pruned, "Pruned identity locks");
        }
        expired
    }

    fn prompt(&self, index: usize) -> Result<PromptPayload, QuizError> {
        let question = self.bank.question_at(index)?;
        Ok(PromptPayload {
            question_index: index,
            question_count: self.bank.question_count(),
            text: question.text.clone(),
            options: question
                .options
                .iter()
                .enumerate()
                .map(|(i, option)| PromptOption {
                    label: option.label.clone(),
                    selector: Selector::new(index, i),
                })
                .collect(),
        })
    }
}

/// Level a handled quiz error is logged at.
///
/// An out-of-range index behind a well-formed token means a button was built
/// for a question or option that does not exist, so debug builds report it
/// as an error.
fn recovered_level(err: &QuizError) -> Level {
    match err {
        e if e.is_expected() => Level::DEBUG,
        QuizError::InvalidAnswerSequence { .. } => Level::ERROR,
        QuizError::OutOfRange { .. } if cfg!(debug_assertions) => Level::ERROR,
        _ => Level::WARN,
    }
}

fn log_recovered(identity: &Identity, err: &QuizError) {
    let level = recovered_level(err);
    if level == Level::DEBUG {
        debug!(identity = %identity, "Ignoring quiz action: {}", err);
    } else if level == Level::ERROR {
        error!(identity = %identity, "Quiz invariant violated: {}", err);
    } else {
        warn!(identity = %identity, "Rejected quiz action: {}", err);
    }
}

/// Spawn a background task that periodically expires idle sessions.
pub fn spawn_expiry_task(
    controller: Arc<QuizController>,
    max_idle: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip immediate first tick
        loop {
            interval.tick().await;
            controller.expire_idle(max_idle).await;
        }
    })
}
