//! Maps inbound messages to bot actions.

use crate::channels::IncomingMessage;
use crate::quiz::Selector;

use super::texts::menu;

/// Callback data carried by the bot's own inline buttons.
pub mod callbacks {
    pub const START_QUIZ: &str = "start_quiz";
    pub const RETRY: &str = "retry";
    pub const LEARN_MORE: &str = "learn_more";
    pub const SEND_MESSAGE: &str = "send_message";
}

/// Something the user asked the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `/start`: greeting and main menu.
    Welcome,
    Help,
    /// Start or restart the quiz.
    StartQuiz,
    /// A quiz answer button; holds the raw selector token.
    Answer(String),
    Guardianship,
    Contact,
    /// Ask for feedback via `/feedback` or the menu.
    Feedback,
    /// Ask for a message to staff via the contact button.
    MessageStaff,
    /// Free text, possibly the feedback the bot asked for.
    Text(String),
    /// A button the bot does not know (e.g. from an older version).
    Unknown(String),
}

impl Action {
    /// Classify a message.
    pub fn parse(msg: &IncomingMessage) -> Self {
        if msg.is_callback() {
            Self::from_callback(&msg.content)
        } else {
            Self::from_text(&msg.content)
        }
    }

    fn from_callback(data: &str) -> Self {
        match data {
            callbacks::START_QUIZ | callbacks::RETRY => Self::StartQuiz,
            callbacks::LEARN_MORE => Self::Guardianship,
            callbacks::SEND_MESSAGE => Self::MessageStaff,
            token if Selector::is_token(token) => Self::Answer(token.to_string()),
            other => Self::Unknown(other.to_string()),
        }
    }

    fn from_text(content: &str) -> Self {
        let trimmed = content.trim();

        if let Some(command) = parse_command(trimmed) {
            return match command.as_str() {
                "start" => Self::Welcome,
                "help" => Self::Help,
                "quiz" => Self::StartQuiz,
                "guardianship" => Self::Guardianship,
                "contact" => Self::Contact,
                "feedback" => Self::Feedback,
                _ => Self::Text(trimmed.to_string()),
            };
        }

        match trimmed {
            menu::START_QUIZ => Self::StartQuiz,
            menu::HELP => Self::Help,
            menu::CONTACTS => Self::Contact,
            menu::FEEDBACK => Self::Feedback,
            _ => Self::Text(trimmed.to_string()),
        }
    }

    /// Whether this action starts a new prompt flow and so cancels a pending
    /// feedback request.
    pub fn cancels_feedback(&self) -> bool {
        !matches!(self, Self::Text(_) | Self::Unknown(_))
    }
}

/// `/Quiz@ZooBot args` -> `quiz`.
fn parse_command(text: &str) -> Option<String> {
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}
