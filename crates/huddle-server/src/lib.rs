//! Huddle rendezvous relay.
//!
//! An untrusted relay for two-party encrypted chat: it reserves rooms,
//! pairs exactly two connections per room, exchanges their announced public
//! keys, and relays opaque ciphertext between them. It stores nothing and
//! can read nothing.
//!
//! The protocol logic is a sans-IO driver ([`RelayDriver`]); the transport
//! ([`http`], [`RelayServer`]) is a thin axum shell around it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
mod error;
pub mod http;
pub mod registry;
mod server;

pub use driver::{
    MAX_CONNECTIONS_PER_IP, PENDING_ROOM_TTL, RelayAction, RelayConfig, RelayDriver, RelayEvent,
    SWEEP_INTERVAL,
};
pub use error::ServerError;
pub use registry::{MAX_ROOM_OCCUPANCY, Participant, RoomRegistry};
pub use server::{RelayServer, ServerRuntimeConfig};
