//! Telegram channel: long-polls the Bot API for messages and button presses.
//!
//! Native Telegram Bot API client over reqwest. Inline keyboards carry quiz
//! selector tokens as callback data; results with an image go out through
//! `sendPhoto` with the text as caption.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;

use crate::channels::{
    ButtonTarget, Channel, IncomingMessage, Keyboard, MessageStream, OutgoingResponse,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for sendPhoto.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel speaking the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    /// Usernames or numeric ids; `*` admits everyone.
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Whether a sender with this username and/or numeric id may use the bot.
    pub fn allows(&self, username: Option<&str>, user_id: Option<&str>) -> bool {
        sender_allowed(&self.allowed_users, username, user_id)
    }

    async fn post_json(&self, method: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| send_failed(e.without_url().to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = resp.text().await.unwrap_or_default();
        Err(send_failed(format!("{method} returned {status}: {detail}")))
    }

    /// Send text in chunks of at most 4096 chars, keyboard on the last one.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = chunk_text(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = json!({ "chat_id": chat_id, "text": chunk });
            if let Some(kb) = keyboard.filter(|_| i == last) {
                body["reply_markup"] = reply_markup(kb);
            }
            self.post_json("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Upload an image from disk via `sendPhoto`.
    pub async fn send_photo(
        &self,
        chat_id: &str,
        file_path: &Path,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> anyhow::Result<()> {
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo.jpg")
            .to_owned();
        let bytes = tokio::fs::read(file_path).await?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_owned())
            .part("photo", Part::bytes(bytes).file_name(file_name.clone()));
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_owned());
        }
        if let Some(kb) = keyboard {
            form = form.text("reply_markup", reply_markup(kb).to_string());
        }

        let resp = self
            .client
            .post(self.api_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("sendPhoto returned {status}: {detail}");
        }

        tracing::debug!(chat_id, file = %file_name, "Telegram photo sent");
        Ok(())
    }

    /// Remove any webhook so getUpdates long-polling is allowed.
    async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.post_json("deleteWebhook", &json!({})).await
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        if let Err(e) = self.delete_webhook().await {
            tracing::warn!("Telegram deleteWebhook failed: {e}");
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(poll_updates(
            self.client.clone(),
            self.api_url("getUpdates"),
            self.allowed_users.clone(),
            tx,
        ));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| send_failed("No chat_id in message metadata".into()))?;

        let fits_caption = response.content.chars().count() <= TELEGRAM_MAX_CAPTION_LENGTH;
        if let Some(photo) = response.photo.as_deref().filter(|_| fits_caption) {
            let sent = self
                .send_photo(
                    chat_id,
                    photo,
                    Some(&response.content),
                    response.keyboard.as_ref(),
                )
                .await;
            match sent {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(
                    photo = %photo.display(),
                    "Telegram photo failed, sending text only: {e}"
                ),
            }
        }

        self.send_message(chat_id, response.text_without_photo(), response.keyboard.as_ref())
            .await
    }

    async fn acknowledge(&self, msg: &IncomingMessage) -> Result<(), ChannelError> {
        let Some(query_id) = msg.metadata.get("callback_query_id").and_then(Value::as_str)
        else {
            return Ok(());
        };
        self.post_json(
            "answerCallbackQuery",
            &json!({ "callback_query_id": query_id }),
        )
        .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        self.client
            .get(self.api_url("getMe"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map(|_| ())
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        token.expose_secret()
    )
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

/// Long-poll getUpdates until the receiving side goes away.
async fn poll_updates(
    client: reqwest::Client,
    url: String,
    allowed_users: Vec<String>,
    tx: UnboundedSender<IncomingMessage>,
) {
    let mut offset: i64 = 0;
    tracing::info!("Telegram channel polling for updates");

    loop {
        let updates = match fetch_updates(&client, &url, offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Telegram getUpdates failed: {e}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in &updates {
            if let Some(id) = update.get("update_id").and_then(Value::as_i64) {
                offset = offset.max(id + 1);
            }
            let Some(incoming) = parse_update(update, &allowed_users) else {
                continue;
            };
            if tx.send(incoming).is_err() {
                tracing::info!("Telegram receiver dropped, stopping poll");
                return;
            }
        }
    }
}

async fn fetch_updates(
    client: &reqwest::Client,
    url: &str,
    offset: i64,
) -> anyhow::Result<Vec<Value>> {
    let body = json!({
        "offset": offset,
        "timeout": POLL_TIMEOUT_SECS,
        "allowed_updates": ["message", "callback_query"],
    });
    // Errors carry the request URL, which embeds the bot token.
    let data: Value = client
        .post(url)
        .json(&body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(reqwest::Error::without_url)?
        .json()
        .await
        .map_err(reqwest::Error::without_url)?;

    match data.get("result").and_then(Value::as_array) {
        Some(updates) if data["ok"].as_bool() == Some(true) => Ok(updates.clone()),
        _ => anyhow::bail!("unexpected getUpdates response: {data}"),
    }
}

fn sender_allowed(allowed_users: &[String], username: Option<&str>, user_id: Option<&str>) -> bool {
    allowed_users.iter().any(|entry| {
        entry == "*" || Some(entry.as_str()) == username || Some(entry.as_str()) == user_id
    })
}

/// Turn one getUpdates entry into an `IncomingMessage`.
///
/// Handles text messages and inline button presses. Returns `None` for other
/// update kinds and for senders outside the allowlist.
fn parse_update(update: &Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let (from, chat, content, query_id) = if let Some(message) = update.get("message") {
        let text = message.get("text").and_then(Value::as_str)?;
        (message.get("from")?, message.get("chat")?, text, None)
    } else if let Some(query) = update.get("callback_query") {
        let data = query.get("data").and_then(Value::as_str)?;
        let chat = query.get("message").and_then(|m| m.get("chat"))?;
        let id = query.get("id").and_then(Value::as_str).unwrap_or_default();
        (query.get("from")?, chat, data, Some(id))
    } else {
        return None;
    };

    let username = from.get("username").and_then(Value::as_str);
    let user_id = from.get("id").and_then(Value::as_i64).map(|id| id.to_string());
    if !sender_allowed(allowed_users, username, user_id.as_deref()) {
        tracing::warn!(
            username = username.unwrap_or("-"),
            user_id = user_id.as_deref().unwrap_or("-"),
            "Telegram: ignoring update from user outside the allowlist"
        );
        return None;
    }

    let chat_id = chat.get("id").and_then(Value::as_i64)?.to_string();
    let sender = user_id.as_deref().or(username).unwrap_or("unknown");

    let incoming = match query_id {
        Some(_) => IncomingMessage::callback("telegram", sender, content),
        None => IncomingMessage::new("telegram", sender, content),
    }
    .with_thread(&chat_id)
    .with_metadata(json!({
        "chat_id": chat_id,
        "username": username,
        "callback_query_id": query_id,
    }));

    match from.get("first_name").and_then(Value::as_str).or(username) {
        Some(name) => Some(incoming.with_user_name(name)),
        None => Some(incoming),
    }
}

/// Render a keyboard as a Bot API `reply_markup` object.
fn reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| match &button.target {
                            ButtonTarget::Callback(data) => {
                                json!({ "text": button.text, "callback_data": data })
                            }
                            ButtonTarget::Url(url) => json!({ "text": button.text, "url": url }),
                        })
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Keyboard::Menu(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
    }
}

/// Break `text` into pieces of at most `limit` characters, cutting at the
/// last newline or space in each window when there is one.
fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some((cut, _)) = rest.char_indices().nth(limit) {
        let window = &rest[..cut];
        let at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);
        pieces.push(window[..at].to_string());
        rest = rest[at..].trim_start();
    }
    if !rest.is_empty() || pieces.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

// ── Tests ───────────────────────────────────────────────────────────
