//! Free-text feedback: an append-only log file and the set of conversations
//! whose next message is expected to be feedback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::FeedbackError;
use crate::quiz::Identity;

/// Append-only feedback file, one entry per line.
pub struct FeedbackLog {
    path: PathBuf,
    // Serializes appends so concurrent entries never interleave.
    write_lock: tokio::sync::Mutex<()>,
}

impl FeedbackLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Line breaks in `text` are folded into spaces.
    pub async fn append(&self, user_id: &str, text: &str) -> Result<(), FeedbackError> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(FeedbackError::Empty);
        }

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("Feedback from user {user_id}: {text}\n").as_bytes())
            .await?;
        file.flush().await?;

        tracing::info!(user = user_id, "Feedback saved");
        Ok(())
    }
}

/// Conversations waiting to type feedback, with when they were asked.
#[derive(Default)]
pub struct PendingFeedback {
    waiting: Mutex<HashMap<Identity, DateTime<Utc>>>,
}

impl PendingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the next text from `identity` as feedback.
    pub fn wait_for(&self, identity: &Identity) {
        self.lock().insert(identity.clone(), Utc::now());
    }

    /// Consume the pending flag. Returns whether one was set.
    pub fn take(&self, identity: &Identity) -> bool {
        self.lock().remove(identity).is_some()
    }

    pub fn is_waiting(&self, identity: &Identity) -> bool {
        self.lock().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget requests older than `max_idle`. Returns the number dropped.
    pub fn expire(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut waiting = self.lock();
        let before = waiting.len();
        waiting.retain(|_, asked_at| *asked_at > cutoff);
        let expired = before - waiting.len();
        if expired > 0 {
            tracing::debug!(count = expired, "Expired pending feedback requests");
        }
        expired
    }

    #[cfg(test)]
    fn backdate(&self, identity: &Identity, by: chrono::Duration) {
        if let Some(asked_at) = self.lock().get_mut(identity) {
            *asked_at -= by;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Identity, DateTime<Utc>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tempfile::TempDir;

    fn log_in(dir: &TempDir) -> FeedbackLog {
        FeedbackLog::new(dir.path().join("feedback.txt"))
    }

    #[tokio::test]
    async fn append_creates_and_appends() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append("42", "Great zoo").await.unwrap();
        log.append("43", "More otters please").await.unwrap();

        let content = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(
            content,
            "Feedback from user 42: Great zoo\nFeedback from user 43: More otters please\n"
        );
    }

    #[tokio::test]
    async fn multiline_text_is_folded() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        log.append("42", "line one\nline two\r\n").await.unwrap();
        let content = fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(content, "Feedback from user 42: line one line two\n");
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let dir = TempDir::new().unwrap();
        let log = log_in(&dir);
        assert!(matches!(log.append("42", "  \n ").await, Err(FeedbackError::Empty)));
        assert!(!log.path().exists());
    }

    #[tokio::test]
    async fn creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let log = FeedbackLog::new(dir.path().join("nested/logs/feedback.txt"));
        log.append("1", "hi").await.unwrap();
        assert!(log.path().exists());
    }

    #[tokio::test]
    async fn concurrent_appends_keep_whole_lines() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(log_in(&dir));
        let mut handles = Vec::new();
        for n in 0..20 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                log.append(&n.to_string(), "hello there").await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let content = fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 20);
        assert!(lines.iter().all(|l| l.ends_with(": hello there")));
    }

    #[test]
    fn pending_wait_and_take() {
        let pending = PendingFeedback::new();
        let id = Identity::from("telegram:1");
        assert!(!pending.take(&id));

        pending.wait_for(&id);
        assert!(pending.is_waiting(&id));
        assert!(pending.take(&id));
        assert!(!pending.take(&id));
    }

    #[test]
    fn stale_pending_requests_expire() {
        let pending = PendingFeedback::new();
        let stale = Identity::from("telegram:1");
        let fresh = Identity::from("telegram:2");
        pending.wait_for(&stale);
        pending.wait_for(&fresh);
        pending.backdate(&stale, chrono::Duration::hours(2));

        assert_eq!(pending.expire(Duration::from_secs(3600)), 1);
        assert!(!pending.is_waiting(&stale));
        assert!(pending.is_waiting(&fresh));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn expire_with_huge_window_keeps_everything() {
        let pending = PendingFeedback::new();
        pending.wait_for(&Identity::from("telegram:1"));
        assert_eq!(pending.expire(Duration::MAX), 0);
        assert!(!pending.is_empty());
    }
}
