//! WebRTC Signaling Relay Library
//!
//! Lets browser peers meet in a shared room and exchange the SDP offers,
//! answers and ICE candidates they need to connect directly. The relay never
//! touches media and never inspects payloads.
//!
//! # Features
//! - Room creation with short random URL-safe ids
//! - Room listing with live member counts
//! - WebSocket join at `/rooms/{id}`
//! - Offer/answer targeting and ICE fan-out
//! - Departure notifications
//! - Automatic expiry of empty rooms
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each `Room` is an actor owning its member list
//! - Each connection runs a `Client` pump feeding the room's inbox
//! - `RoomRegistry` maps ids to room handles; rooms remove themselves on close
//! - No locks around membership - all changes go through the room's inbox
//!
//! # Example
//! ```ignore
//! use signal_relay::{router, RoomRegistry, RoomSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = RoomRegistry::new(RoomSettings::default());
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3333").await.unwrap();
//!     axum::serve(listener, router(registry)).await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ClientHandle, OUTBOX_CAPACITY};
pub use config::Config;
pub use connection::{Connection, ConnectionSink, ConnectionStream, WebSocketConnection};
pub use error::{AppError, SendError, TransportError};
pub use handler::router;
pub use message::{Message, MessageType, RoomInfo};
pub use registry::{RoomRegistry, RoomSettings, MAX_ID_ATTEMPTS};
pub use room::{Room, RoomEvent, RoomHandle, RoomState};
pub use types::{ClientId, IdGenerator, RandomIdGenerator, RoomId};
