//! Channel trait and the message types exchanged with channels.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;
use crate::quiz::Identity;

/// Stream of inbound messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// How a message reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Typed text (commands, menu buttons, free text).
    Text,
    /// Inline button press; `content` holds the callback data.
    Callback,
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel name this message came from.
    pub channel: String,
    /// Sender id within the channel.
    pub user_id: String,
    /// Display name, if the channel knows one.
    pub user_name: Option<String>,
    /// Conversation id (a Telegram chat). Falls back to `user_id` when absent.
    pub thread_id: Option<String>,
    /// Text or callback data.
    pub content: String,
    pub kind: MessageKind,
    /// Channel-specific data needed to respond.
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            thread_id: None,
            content: content.to_string(),
            kind: MessageKind::Text,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    /// A button press carrying `data`.
    pub fn callback(channel: &str, user_id: &str, data: &str) -> Self {
        Self {
            kind: MessageKind::Callback,
            ..Self::new(channel, user_id, data)
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    pub fn with_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }

    pub fn is_callback(&self) -> bool {
        self.kind == MessageKind::Callback
    }

    /// Session key for this conversation, scoped by channel.
    pub fn identity(&self) -> Identity {
        let key = self.thread_id.as_deref().unwrap_or(&self.user_id);
        Identity::new(format!("{}:{}", self.channel, key))
    }
}

/// Where an inline button leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTarget {
    /// Sent back to us as a callback.
    Callback(String),
    /// Opened by the client.
    Url(String),
}

/// A button attached to a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub target: ButtonTarget,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: ButtonTarget::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: ButtonTarget::Url(url.into()),
        }
    }
}

/// Keyboard shown with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons under the message, one inner vec per row.
    Inline(Vec<Vec<InlineButton>>),
    /// Persistent menu replacing the text keyboard; pressing sends the label as text.
    Menu(Vec<Vec<String>>),
}

/// A response to send back through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub content: String,
    pub keyboard: Option<Keyboard>,
    /// Image to send with `content` as its caption.
    pub photo: Option<PathBuf>,
    /// Text to send instead when the photo cannot be delivered.
    pub photo_fallback: Option<String>,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            keyboard: None,
            photo: None,
            photo_fallback: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_photo(mut self, path: PathBuf) -> Self {
        self.photo = Some(path);
        self
    }

    pub fn with_photo_fallback(mut self, text: impl Into<String>) -> Self {
        self.photo_fallback = Some(text.into());
        self
    }

    /// What to send as plain text when the photo is not delivered.
    pub fn text_without_photo(&self) -> &str {
        self.photo_fallback.as_deref().unwrap_or(&self.content)
    }
}

/// A message transport (Telegram, local CLI).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, matched against `IncomingMessage::channel`.
    fn name(&self) -> &str;

    /// Begin receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response in the conversation `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press so the client stops its spinner.
    async fn acknowledge(&self, _msg: &IncomingMessage) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_thread() {
        let msg = IncomingMessage::new("telegram", "42", "hi").with_thread("-100");
        assert_eq!(msg.identity(), Identity::from("telegram:-100"));
    }

    #[test]
    fn identity_falls_back_to_user() {
        let msg = IncomingMessage::new("cli", "local-user", "hi");
        assert_eq!(msg.identity(), Identity::from("cli:local-user"));
    }

    #[test]
    fn callback_constructor_sets_kind() {
        let msg = IncomingMessage::callback("telegram", "42", "q:0:1");
        assert!(msg.is_callback());
        assert_eq!(msg.content, "q:0:1");
        assert!(!IncomingMessage::new("telegram", "42", "q:0:1").is_callback());
    }

    #[test]
    fn response_builders() {
        let r = OutgoingResponse::text("hello")
            .with_keyboard(Keyboard::Menu(vec![vec!["Help".into()]]))
            .with_photo(PathBuf::from("assets/lion.jpg"));
        assert_eq!(r.content, "hello");
        assert!(matches!(r.keyboard, Some(Keyboard::Menu(_))));
        assert_eq!(r.photo.as_deref(), Some(std::path::Path::new("assets/lion.jpg")));
    }

    #[test]
    fn text_without_photo_prefers_fallback() {
        let plain = OutgoingResponse::text("Lion");
        assert_eq!(plain.text_without_photo(), "Lion");

        let card = OutgoingResponse::text("Lion")
            .with_photo(PathBuf::from("assets/lion.jpg"))
            .with_photo_fallback("Lion. Image unavailable.");
        assert_eq!(card.text_without_photo(), "Lion. Image unavailable.");
        assert_eq!(card.content, "Lion");
    }
}
