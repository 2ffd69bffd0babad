//! Totem Bot: a zoo chat bot that finds your totem animal with a short quiz.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod quiz;
