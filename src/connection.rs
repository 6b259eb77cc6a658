//! Connection handle contract
//!
//! A connection is split into a sink and a stream so that one send and one
//! receive can be in flight at the same time. The WebSocket implementation
//! encodes each [`Message`] as a JSON text frame.

use async_trait::async_trait;
use axum::extract::ws::{self, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::message::Message;

/// Outbound half of a connection
#[async_trait]
pub trait ConnectionSink: Send + 'static {
    async fn send(&mut self, msg: Message) -> Result<(), TransportError>;

    /// Close the connection. Calling it more than once is harmless.
    async fn close(&mut self);
}

/// Inbound half of a connection
#[async_trait]
pub trait ConnectionStream: Send + 'static {
    /// Wait for the next decoded message
    async fn receive(&mut self) -> Result<Message, TransportError>;
}

/// Bidirectional transport tied to one peer
pub trait Connection: Send + 'static {
    type Sink: ConnectionSink;
    type Stream: ConnectionStream;

    fn split(self) -> (Self::Sink, Self::Stream);
}

/// Upgraded WebSocket carrying JSON signaling frames
pub struct WebSocketConnection {
    socket: WebSocket,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Connection for WebSocketConnection {
    type Sink = WebSocketSink;
    type Stream = WebSocketStream;

    fn split(self) -> (WebSocketSink, WebSocketStream) {
        let (sender, receiver) = self.socket.split();
        (
            WebSocketSink {
                sender,
                closed: false,
            },
            WebSocketStream { receiver },
        )
    }
}

pub struct WebSocketSink {
    sender: SplitSink<WebSocket, ws::Message>,
    closed: bool,
}

#[async_trait]
impl ConnectionSink for WebSocketSink {
    async fn send(&mut self, msg: Message) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let json = serde_json::to_string(&msg)?;
        self.sender.send(ws::Message::Text(json.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.sender.close().await;
    }
}

pub struct WebSocketStream {
    receiver: SplitStream<WebSocket>,
}

#[async_trait]
impl ConnectionStream for WebSocketStream {
    async fn receive(&mut self) -> Result<Message, TransportError> {
        loop {
            let frame = self
                .receiver
                .next()
                .await
                .ok_or(TransportError::Closed)??;

            match frame {
                ws::Message::Text(text) => match serde_json::from_str::<Message>(text.as_str()) {
                    Ok(msg) => return Ok(msg),
                    Err(e) => {
                        warn!("Invalid signaling frame: {}", e);
                    }
                },
                ws::Message::Close(_) => return Err(TransportError::Closed),
                // Pong is handled automatically by axum
                ws::Message::Ping(_) | ws::Message::Pong(_) => {}
                ws::Message::Binary(_) => {
                    debug!("Ignoring binary frame");
                }
            }
        }
    }
}
