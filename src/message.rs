//! Message protocol definitions
//!
//! JSON envelope exchanged with browser peers. Every frame carries a
//! `type` plus opaque `data`, and the `from`/`to` client ids. The relay never
//! inspects `data`.

use serde::{Deserialize, Serialize};

use crate::types::{ClientId, RoomId};

/// Signaling message kinds
///
/// Serialized with the exact variant names (`"Join"`, `"SetOffer"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    // Client → Server
    /// Sender announces itself to the room
    Join,
    /// SDP offer for the peer named in `to`
    Offer,
    /// SDP answer for the peer named in `to`
    Answer,
    /// ICE candidate for every other peer
    NewIceCandidate,

    // Server → Client
    /// Ask an earlier joiner to make an offer towards `from`
    CreateOffer,
    /// Relayed offer from `from`
    SetOffer,
    /// Relayed answer from `from`
    SetAnswer,
    /// Relayed ICE candidate from `from`
    AddIceCandidate,
    /// Peer whose id is in `data` left the room
    RemovePeer,
    /// The room is shutting down
    RoomClosed,
}

impl MessageType {
    /// Whether clients are allowed to send this kind
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            MessageType::Join
                | MessageType::Offer
                | MessageType::Answer
                | MessageType::NewIceCandidate
        )
    }
}

/// Wire-level signaling envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Opaque payload (SDP, ICE candidate, departed peer id)
    #[serde(default)]
    pub data: String,
    /// Sender id; stamped by the server on every inbound message
    #[serde(default)]
    pub from: String,
    /// Recipient id; empty for broadcast-style messages
    #[serde(default)]
    pub to: String,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            data: String::new(),
            from: String::new(),
            to: String::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    /// `CreateOffer` on behalf of a newly joined peer
    pub fn create_offer(from: &str) -> Self {
        Self::new(MessageType::CreateOffer).with_from(from)
    }

    /// `RemovePeer` announcing the departure of `departed`
    pub fn remove_peer(departed: &ClientId) -> Self {
        Self::new(MessageType::RemovePeer).with_data(departed.as_str())
    }

    pub fn room_closed() -> Self {
        Self::new(MessageType::RoomClosed)
    }
}

/// Public view of a room, as returned by create-room and list-rooms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: RoomId,
    pub member_count: usize,
}
