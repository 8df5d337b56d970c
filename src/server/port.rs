use crate::domain_model::*;
use anyhow::{Context, anyhow};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{Receiver, Sender};
use warp::ws::Message;

// region conn message

#[derive(Debug, Clone, PartialEq)]
pub enum ConnMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
    CloseWith { code: u16, reason: String },
}

impl ConnMessage {
    pub fn rejection(rejection: HandshakeRejection) -> Self {
        ConnMessage::CloseWith {
            code: rejection.close_code(),
            reason: rejection.reason().to_owned(),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, ConnMessage::Close | ConnMessage::CloseWith { .. })
    }
}

impl From<Message> for ConnMessage {
    fn from(message: Message) -> Self {
        if message.is_text() {
            ConnMessage::Text(message.to_str().unwrap_or_default().to_owned())
        } else if message.is_ping() {
            ConnMessage::Ping
        } else if message.is_pong() {
            ConnMessage::Pong
        } else if message.is_close() {
            match message.close_frame() {
                Some((code, reason)) => ConnMessage::CloseWith {
                    code,
                    reason: reason.to_owned(),
                },
                None => ConnMessage::Close,
            }
        } else {
            ConnMessage::Binary(message.into_bytes())
        }
    }
}

impl From<ConnMessage> for Message {
    fn from(message: ConnMessage) -> Message {
        match message {
            ConnMessage::Text(t) => Message::text(t),
            ConnMessage::Binary(b) => Message::binary(b),
            ConnMessage::Ping => Message::ping(Vec::new()),
            ConnMessage::Pong => Message::pong(Vec::new()),
            ConnMessage::Close => Message::close(),
            ConnMessage::CloseWith { code, reason } => Message::close_with(code, reason),
        }
    }
}

// endregion

// region conn sender

/// Write half of a realtime connection.
#[async_trait::async_trait]
pub trait ConnSender: Send + Sync {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()>;

    async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
        self.send(ConnMessage::Text(text)).await
    }

    /// Closes a connection whose handshake failed with the rejection's close code.
    async fn refuse(&mut self, rejection: HandshakeRejection) -> anyhow::Result<()> {
        self.send(ConnMessage::rejection(rejection)).await
    }
}

#[async_trait::async_trait]
impl ConnSender for SplitSink<warp::ws::WebSocket, Message> {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()> {
        let closing = message.is_close();
        SinkExt::send(self, Message::from(message))
            .await
            .context("websocket write failed")?;
        if closing {
            // flushes the close frame before the socket halves drop
            SinkExt::close(self).await.ok();
        }
        Ok(())
    }
}

/// In-process transport; a dropped receiver reads as a closed peer.
#[async_trait::async_trait]
impl ConnSender for Sender<ConnMessage> {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()> {
        Sender::send(self, message)
            .await
            .map_err(|_| anyhow!("connection channel closed"))
    }
}

// endregion

// region conn receiver

/// Read half of a realtime connection. `None` means the peer is gone.
#[async_trait::async_trait]
pub trait ConnReceiver: Send + Sync {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>>;
}

#[async_trait::async_trait]
impl ConnReceiver for SplitStream<warp::ws::WebSocket> {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>> {
        loop {
            let frame = match StreamExt::next(self).await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(anyhow!(e).context("websocket read failed"))),
            };
            // protocol pings are answered by the socket itself
            if frame.is_ping() || frame.is_pong() {
                continue;
            }
            return Some(Ok(ConnMessage::from(frame)));
        }
    }
}

#[async_trait::async_trait]
impl ConnReceiver for Receiver<ConnMessage> {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>> {
        self.recv().await.map(Ok)
    }
}

// endregion

/// Delivery seam between domain events and live connections.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Returns how many connections received the message.
    async fn deliver(&self, receiver: UserId, message: &ServerMessage) -> anyhow::Result<usize>;
}
