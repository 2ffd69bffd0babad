//! Error types for the totem bot.

/// Errors that stop the bot's run loop. Quiz and feedback errors are
/// handled per message and never get this far.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while building the question bank or the category catalog.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Failed to parse quiz definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read quiz definition: {0}")]
    Io(#[from] std::io::Error),

    #[error("Question bank is empty")]
    Empty,

    #[error("Question {question} has no options")]
    NoOptions { question: usize },

    #[error("Category catalog is empty")]
    NoCategories,

    #[error("Duplicate category id: {0}")]
    DuplicateCategory(String),

    #[error("Question {question} option {option} weights unknown category {category}")]
    UnknownCategory {
        question: usize,
        option: usize,
        category: String,
    },
}

/// Quiz core errors.
///
/// `NoActiveSession` and `StaleAnswer` are part of normal operation: button
/// presses can arrive after the quiz they belong to has finished or restarted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("No active quiz session for {identity}")]
    NoActiveSession { identity: String },

    #[error("Invalid answer sequence: {reason}")]
    InvalidAnswerSequence { reason: String },

    #[error("Stale answer for question {got}, session is at question {expected}")]
    StaleAnswer { expected: usize, got: usize },

    #[error("Invalid selector token: {0}")]
    InvalidSelector(String),
}

impl QuizError {
    /// Whether this error is expected in normal operation and can be dropped quietly.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NoActiveSession { .. } | Self::StaleAnswer { .. })
    }
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel not found: {0}")]
    NotFound(String),
}

/// Feedback log errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Feedback text is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
