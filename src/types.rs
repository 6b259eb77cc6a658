//! Basic type definitions for the signaling relay
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: random identifier of a peer within its room
//! - `RoomId`: random identifier of a live room
//!
//! Both are produced by an [`IdGenerator`].

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// URL-safe alphabet (RFC 4648 §5). 64 symbols, so every byte maps uniformly
/// through its low six bits.
const URL_SAFE_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Source of short opaque identifiers for rooms and clients
pub trait IdGenerator: Send + Sync {
    /// Produce an identifier of exactly `len` URL-safe characters
    fn generate(&self, len: usize) -> Result<String, AppError>;
}

/// Identifier generator backed by the operating system's CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self, len: usize) -> Result<String, AppError> {
        let mut buf = vec![0u8; len];
        OsRng.try_fill_bytes(&mut buf).map_err(AppError::IdGenerator)?;

        Ok(buf
            .into_iter()
            .map(|b| URL_SAFE_ALPHABET[(b & 0x3f) as usize] as char)
            .collect())
    }
}

/// Identifier of a client, unique within its room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a room, unique among live rooms
///
/// Appears in URLs (`/rooms/{id}`), hence the URL-safe alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
