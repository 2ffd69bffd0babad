//! Session store: in-memory per-identity quiz progress.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::bank::QuestionBank;
use crate::error::QuizError;

/// Stable key for one conversation (a Telegram chat id, or the CLI user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Identity {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Progress of one quiz run.
#[derive(Debug, Clone)]
pub struct Session {
    /// Chosen option per answered question, in question order.
    pub answers: Vec<usize>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            answers: Vec::new(),
            started_at: now,
            last_activity: now,
        }
    }

    /// Index of the question awaiting an answer.
    pub fn current_question(&self) -> usize {
        self.answers.len()
    }

    /// Time since the quiz was started.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Owns every session. At most one session per identity.
pub struct SessionStore {
    bank: Arc<QuestionBank>,
    sessions: RwLock<HashMap<Identity, Session>>,
}

impl SessionStore {
    pub fn new(bank: Arc<QuestionBank>) -> Arc<Self> {
        Arc::new(Self {
            bank,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Create a fresh session, discarding any progress already held for `identity`.
    pub async fn start_session(&self, identity: &Identity) {
        let previous = self
            .sessions
            .write()
            .await
            .insert(identity.clone(), Session::new());
        if let Some(previous) = previous {
            debug!(
                identity = %identity,
                discarded = previous.answers.len(),
                "Quiz restarted, previous progress discarded"
            );
        }
    }

    /// Append an answer for the current question. Returns the new progress count.
    pub async fn record_answer(
        &self,
        identity: &Identity,
        option: usize,
    ) -> Result<usize, QuizError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(identity)
            .ok_or_else(|| no_session(identity))?;

        let question = self.bank.question_at(session.current_question())?;
        question.option_at(option)?;

        session.answers.push(option);
        session.last_activity = Utc::now();
        Ok(session.answers.len())
    }

    /// Index of the next question to answer.
    pub async fn current_question_index(&self, identity: &Identity) -> Result<usize, QuizError> {
        self.sessions
            .read()
            .await
            .get(identity)
            .map(Session::current_question)
            .ok_or_else(|| no_session(identity))
    }

    /// Snapshot of the answers recorded so far.
    pub async fn answers(&self, identity: &Identity) -> Result<Vec<usize>, QuizError> {
        self.sessions
            .read()
            .await
            .get(identity)
            .map(|s| s.answers.clone())
            .ok_or_else(|| no_session(identity))
    }

    /// Delete the session, returning it if there was one.
    pub async fn end_session(&self, identity: &Identity) -> Option<Session> {
        self.sessions.write().await.remove(identity)
    }

    /// Drop sessions with no activity for longer than `max_idle`.
    /// Returns the number of sessions removed.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity >= cutoff);
        let expired = before - sessions.len();

        if expired > 0 {
            info!(count = expired, "Expired idle quiz sessions");
        }
        expired
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    #[cfg(test)]
    async fn backdate(&self, identity: &Identity, by: chrono::Duration) {
        if let Some(session) = self.sessions.write().await.get_mut(identity) {
            session.last_activity -= by;
        }
    }

    #[cfg(test)]
    async fn backdate_start(&self, identity: &Identity, by: chrono::Duration) {
        if let Some(session) = self.sessions.write().await.get_mut(identity) {
            session.started_at -= by;
        }
    }
}

fn no_session(identity: &Identity) -> QuizError {
    QuizError::NoActiveSession {
        identity: identity.to_string(),
    }
}
