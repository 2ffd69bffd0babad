//! Quiz core: question bank, scoring, sessions and the conversation state machine.
//!
//! The controller is the only writer of the session store. The bank and the
//! scoring engine are immutable after construction and shared through `Arc`.

pub mod bank;
pub mod controller;
pub mod scoring;
pub mod selector;
pub mod session;

pub use bank::{Question, QuestionBank, QuizDefinition, QuizOption};
pub use controller::{
    IdentityLocks, PromptOption, PromptPayload, QuizController, QuizReply, QuizState,
    ResultPayload, spawn_expiry_task,
};
pub use scoring::{Category, Scores, ScoringEngine};
pub use selector::Selector;
pub use session::{Identity, Session, SessionStore};
