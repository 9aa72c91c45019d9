//! Wire protocol for the huddle relay.
//!
//! Defines the JSON event frames exchanged over the persistent connection,
//! the validated room id type, and the typed error codes the relay reports.
//! Everything here is transport-agnostic: the server and client crates own
//! the sockets, this crate owns the shapes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod room;

pub use error::{ErrorCode, ProtocolError};
pub use event::{AckStatus, ClientFrame, MAX_MESSAGE_BYTES, ServerFrame};
pub use room::{ROOM_ID_LEN, RoomId};
