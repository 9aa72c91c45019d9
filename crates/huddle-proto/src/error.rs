//! Protocol error types and the wire-level error code taxonomy.

use serde::{Deserialize, Serialize};

/// Errors produced while building or parsing protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A room id failed validation.
    #[error("invalid room id: {raw:?}")]
    InvalidRoomId {
        /// The rejected input.
        raw: String,
    },

    /// A frame could not be decoded from JSON.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

/// Typed error codes the relay sends back on the `error` event.
///
/// Each per-connection failure maps to exactly one of these; the connection
/// stays usable unless the code says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Registration payload had an empty or non-string field.
    InvalidRegistration,
    /// The target room already holds two members.
    RoomFull,
    /// The originating address is at its connection cap.
    ConnectionLimitExceeded,
    /// A message was relayed before the sender registered.
    NotRegistered,
    /// A relayed message exceeded the transport size ceiling.
    MessageTooLarge,
}
