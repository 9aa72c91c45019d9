//! Client-side session logic for huddle.
//!
//! Everything a chat front end needs short of a transport:
//!
//! - [`keystore`]: key pair lifetime (generation, fingerprint-wrapped
//!   persistence, rotation on expiry)
//! - [`client`]: the sans-IO session state machine
//! - [`watchdog`]: the inactivity timer that ends idle sessions
//! - [`store`]: the session-scoped storage abstraction keys live behind
//!
//! The transport shim owns the socket and the clock; it feeds
//! [`ClientEvent`]s into [`ChatClient::process_event`] and executes the
//! returned [`ClientAction`]s verbatim.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod event;
pub mod keystore;
pub mod store;
pub mod watchdog;

pub use client::{CONNECT_TIMEOUT, ChatClient, MAX_CONNECT_ATTEMPTS};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, ConnectionStatus, Notice};
pub use keystore::{KEY_ROTATION_INTERVAL, KeyLifecycle, LoadOutcome};
pub use store::{MemorySessionStore, SessionStore};
