//! Event frames exchanged over the persistent connection.
//!
//! The wire format is adjacently tagged JSON: `{"event": ..., "data": ...}`,
//! with event names and field casing matching the relay protocol. Message
//! payloads are opaque to the relay; it never inspects `message` contents.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, ProtocolError};

/// Hard per-frame transport ceiling in bytes. The relay caps incoming socket
/// payloads at this size and answers oversized relayed messages with a typed
/// error instead of forwarding them.
pub const MAX_MESSAGE_BYTES: usize = 32 * 1024;

/// Frames sent client → server.
///
/// Registration carries raw strings rather than validated types: the relay
/// is the one that decides whether a payload is acceptable, and answers a
/// bad one with a typed `error` event instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// Join a room, announcing our public key encoding.
    #[serde(rename = "register", rename_all = "camelCase")]
    Register {
        /// Base64 SPKI encoding of the sender's public key.
        public_key: String,
        /// Target room id (validated server-side).
        room_id: String,
    },

    /// Relay an opaque ciphertext blob to the other room member.
    #[serde(rename = "room message")]
    RoomMessage {
        /// Chunk-joined encrypted envelope. Opaque to the relay.
        message: String,
    },
}

/// Delivery status carried in acknowledgment frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// Registration accepted.
    Ok,
    /// Message relayed to the peer (best effort, at most once).
    Delivered,
}

/// Frames sent server → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    /// The target room already has two members; abandon the attempt.
    #[serde(rename = "room_full")]
    RoomFull,

    /// Public keys of the members already present, sent to a new joiner.
    #[serde(rename = "peers list")]
    PeersList {
        /// Peer public key encodings (at most one under the two-party cap).
        peers: Vec<String>,
    },

    /// A peer joined the room after us.
    #[serde(rename = "peer connected", rename_all = "camelCase")]
    PeerConnected {
        /// The new member's public key encoding.
        peer_key: String,
        /// The new member's connection id.
        socket_id: String,
    },

    /// The peer left or dropped.
    #[serde(rename = "peer disconnected", rename_all = "camelCase")]
    PeerDisconnected {
        /// The departed member's public key encoding.
        peer_key: String,
    },

    /// A per-connection operation failed.
    #[serde(rename = "error")]
    Error {
        /// Typed code, when the failure maps to one.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
        /// Human-readable description.
        message: String,
    },

    /// A relayed message from the other room member.
    #[serde(rename = "room message")]
    RoomMessage {
        /// Server-assigned id: `"{connection}-{timestamp_ms}"`.
        id: String,
        /// Sender's public key encoding.
        from: String,
        /// Opaque ciphertext blob as sent.
        message: String,
        /// Server receive time, Unix milliseconds.
        timestamp: u64,
    },

    /// Acknowledges a `register` frame.
    #[serde(rename = "register ack")]
    RegisterAck {
        /// Always [`AckStatus::Ok`] on success.
        status: AckStatus,
    },

    /// Acknowledges a `room message` frame, sender only.
    #[serde(rename = "message ack", rename_all = "camelCase")]
    MessageAck {
        /// Always [`AckStatus::Delivered`].
        status: AckStatus,
        /// Server-assigned id, used to reconcile optimistic local ids.
        message_id: String,
    },
}

impl ClientFrame {
    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl ServerFrame {
    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}
