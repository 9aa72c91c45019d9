//! Room identifiers.
//!
//! A room id is the rendezvous token two clients share out of band (link,
//! QR code). The relay only ever sees the id; it carries no key material.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Required length of a room id.
pub const ROOM_ID_LEN: usize = 8;

/// A validated room identifier: exactly 8 ASCII alphanumeric characters.
///
/// Construction goes through [`RoomId::parse`] (or `FromStr`/serde), so a
/// held `RoomId` is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validate and wrap a raw room id string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRoomId`] unless the input is exactly
    /// [`ROOM_ID_LEN`] ASCII alphanumeric characters.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if raw.len() != ROOM_ID_LEN || !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ProtocolError::InvalidRoomId { raw: raw.to_string() });
        }
        Ok(Self(raw.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}
