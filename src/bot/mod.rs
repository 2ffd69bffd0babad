//! Presentation layer: commands, texts, share links, feedback and the run loop.

pub mod action;
pub mod dispatcher;
pub mod feedback;
pub mod share;
pub mod texts;

pub use action::Action;
pub use dispatcher::ZooBot;
pub use feedback::{FeedbackLog, PendingFeedback};
