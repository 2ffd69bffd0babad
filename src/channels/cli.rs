//! Terminal channel for trying the bot without Telegram.
//!
//! Inline buttons print as `[@token] label`; typing `@token` presses one.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    ButtonTarget, Channel, IncomingMessage, Keyboard, MessageStream, OutgoingResponse,
};
use crate::error::ChannelError;

/// Prefix marking a line as a button press.
const CALLBACK_PREFIX: char = '@';

/// Reads lines from stdin as one local user; prints responses to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(parse_line(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}\n", render(&response));
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn parse_line(line: &str) -> IncomingMessage {
    match line.strip_prefix(CALLBACK_PREFIX) {
        Some(data) => IncomingMessage::callback("cli", "local-user", data.trim()),
        None => IncomingMessage::new("cli", "local-user", line),
    }
}

/// Plain-text rendering of a response with its photo and keyboard.
fn render(response: &OutgoingResponse) -> String {
    let mut out = String::new();
    if let Some(ref photo) = response.photo {
        out.push_str(&format!("🖼  {}\n", photo.display()));
    }
    out.push_str(&response.content);

    match response.keyboard {
        Some(Keyboard::Inline(ref rows)) => {
            for button in rows.iter().flatten() {
                match &button.target {
                    ButtonTarget::Callback(data) => {
                        out.push_str(&format!("\n  [{CALLBACK_PREFIX}{data}] {}", button.text))
                    }
                    ButtonTarget::Url(url) => out.push_str(&format!("\n  [{}] {url}", button.text)),
                }
            }
        }
        Some(Keyboard::Menu(ref rows)) => {
            let labels: Vec<&str> = rows.iter().flatten().map(String::as_str).collect();
            out.push_str(&format!("\n  Menu: {}", labels.join(" | ")));
        }
        None => {}
    }
    out
}
