//! Error types for the signaling relay
//!
//! Defines application-level errors, transport errors and outbox send errors.
//! Uses thiserror for ergonomic error definitions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::types::RoomId;

/// Application-level errors
///
/// Covers startup failures and the failures surfaced to the HTTP layer.
/// Peer departures are never reported through this type.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unparsable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] envconfig::Error),

    /// Configuration parsed but out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bind address given on the command line
    #[error("Invalid bind address: {0}")]
    InvalidAddr(#[from] std::net::AddrParseError),

    /// No live room with the given id
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room stopped accepting events
    #[error("Room closed: {0}")]
    RoomClosed(RoomId),

    /// The identifier generator could not obtain randomness
    #[error("Identifier generation failed: {0}")]
    IdGenerator(rand::Error),

    /// Every generated room id collided with a live room
    #[error("No free room id after {0} attempts")]
    RoomIdsExhausted(usize),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RoomClosed(_) => StatusCode::GONE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Connection handle errors
///
/// Any of these ends the client's read loop; the client is then treated
/// as departed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer closed the connection or the stream ended
    #[error("Connection closed")]
    Closed,

    /// WebSocket protocol or IO error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    /// Outbound message could not be encoded
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message send errors
///
/// Occurs when a room pushes onto the outbox of a client that is gone or stalled.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client stopped draining its outbox
    #[error("Outbox full")]
    Full,
}
