//! Channel manager: fans in all channel streams and routes responses back.

use futures::stream;

use super::channel::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Owns the active channels.
#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Box<dyn Channel>) {
        tracing::info!(channel = channel.name(), "Channel registered");
        self.channels.push(channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn get(&self, name: &str) -> Result<&dyn Channel, ChannelError> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .map(|c| &**c)
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))
    }

    /// Start every channel and merge their streams.
    ///
    /// A channel that fails to start is logged and skipped; it is an error
    /// only if none start.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        let mut streams = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            match channel.start().await {
                Ok(s) => {
                    tracing::info!(channel = channel.name(), "Channel started");
                    streams.push(s);
                }
                Err(e) => {
                    tracing::error!(channel = channel.name(), "Channel failed to start: {}", e)
                }
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".into(),
                reason: "no channel started".into(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Send a response on the channel the message came from.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    /// Acknowledge a button press on the originating channel.
    pub async fn acknowledge(&self, msg: &IncomingMessage) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.acknowledge(msg).await
    }

    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), "Channel shutdown failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    /// Emits a fixed list of messages and records responses.
    struct ScriptedChannel {
        name: &'static str,
        script: Vec<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let msgs: Vec<IncomingMessage> = self
                .script
                .iter()
                .map(|text| IncomingMessage::new(self.name, "u", text))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response.content);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn scripted(name: &'static str, script: Vec<&'static str>) -> Box<ScriptedChannel> {
        Box::new(ScriptedChannel {
            name,
            script,
            sent: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let mut manager = ChannelManager::new();
        manager.add(scripted("one", vec!["a", "b"]));
        manager.add(scripted("two", vec!["c"]));
        assert_eq!(manager.names(), vec!["one", "two"]);

        let mut contents: Vec<String> = manager
            .start_all()
            .await
            .unwrap()
            .map(|m| m.content)
            .collect()
            .await;
        contents.sort();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn start_all_without_channels_fails() {
        let manager = ChannelManager::new();
        assert!(matches!(
            manager.start_all().await,
            Err(ChannelError::StartupFailed { .. })
        ));
    }

    #[tokio::test]
    async fn respond_routes_by_channel_name() {
        let mut manager = ChannelManager::new();
        manager.add(scripted("one", vec![]));
        let msg = IncomingMessage::new("one", "u", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("hello"))
            .await
            .unwrap();

        let unknown = IncomingMessage::new("nope", "u", "hi");
        assert!(matches!(
            manager.respond(&unknown, OutgoingResponse::text("x")).await,
            Err(ChannelError::NotFound(_))
        ));
    }
}
