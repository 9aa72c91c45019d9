//! Client events and actions.
//!
//! The chat client is sans-IO: a transport shim feeds [`ClientEvent`]s in
//! and executes the [`ClientAction`]s that come back. All protocol and
//! crypto decisions live in the client; the shim only moves bytes and
//! timers.

use huddle_proto::{ClientFrame, ServerFrame};

/// Input to [`crate::ChatClient::process_event`].
#[derive(Debug)]
pub enum ClientEvent {
    /// The transport finished its handshake and is writable.
    TransportConnected,
    /// The transport dropped, either remotely or from a local error.
    TransportClosed,
    /// A decoded frame arrived from the relay.
    Frame(ServerFrame),
    /// The user submitted a message for sending.
    SendPlaintext(String),
    /// A user-interaction signal (pointer, key press, click).
    Activity,
    /// Periodic timer tick; drives timeouts and the inactivity watchdog.
    Tick,
    /// The session is being dismantled (tab close, explicit leave).
    Teardown,
}

/// Output of [`crate::ChatClient::process_event`], executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Encode and write a frame to the relay.
    SendFrame(ClientFrame),
    /// Append a decrypted peer message to the transcript.
    Deliver {
        /// Relay-assigned message id.
        id: String,
        /// Decrypted plaintext.
        text: String,
        /// Relay-side receive timestamp, ms since the epoch.
        timestamp: u64,
    },
    /// Append the user's own message optimistically, pending confirmation.
    Echo {
        /// Locally assigned id, reconciled by [`ClientAction::ConfirmDelivery`].
        local_id: u64,
        /// The plaintext as typed.
        text: String,
    },
    /// Mark a previously echoed message as relayed.
    ConfirmDelivery {
        /// The id from the matching [`ClientAction::Echo`].
        local_id: u64,
        /// The relay-assigned id from the ack, usable for dedup against
        /// later [`ClientAction::Deliver`]s.
        message_id: String,
    },
    /// Connection status changed; update the indicator.
    Status(ConnectionStatus),
    /// Show a user-facing notice.
    Notify(Notice),
    /// Destroy stored key material. The shim maps this to
    /// [`crate::KeyLifecycle::cleanup`] on whatever store it keeps keys in.
    EraseKeys,
    /// Leave the room view and return to the entry screen.
    ResetToEntry,
    /// Close the transport.
    Disconnect,
    /// Dial the relay again (bounded retry).
    Reconnect,
}

/// Connection state surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Dialing or waiting for registration.
    Connecting,
    /// Registered in the room, no peer yet.
    Waiting,
    /// A peer is present and its key is imported.
    Paired,
    /// The session is over.
    Closed,
}

/// User-facing notices, rendered by the shim however it sees fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The peer joined the room.
    PeerJoined,
    /// The peer left the room.
    PeerLeft,
    /// The room already holds two parties.
    RoomFull,
    /// A message was submitted with no peer present; it was not sent.
    NoPeer,
    /// The relay rejected an operation.
    RelayError(String),
    /// A received message failed to decrypt and was dropped.
    UndecryptableMessage,
    /// The inactivity watchdog fired.
    SessionEnded,
    /// The connection could not be established after bounded retries.
    ConnectionFailed,
}
