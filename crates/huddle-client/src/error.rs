//! Client error types.

use huddle_crypto::CryptoError;
use huddle_proto::ProtocolError;

/// Errors from client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A cryptographic operation failed. The operation in progress is
    /// aborted; no partial key or envelope state is committed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A frame could not be built or parsed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A stored key record was unreadable. Treated as "no keys" by the
    /// lifecycle manager; surfaced here only from direct record access.
    #[error("corrupt key record: {0}")]
    CorruptRecord(String),

    /// A message was submitted before the connected+registered+paired
    /// state was reached. The relay would reject it anyway.
    #[error("not ready to send: {reason}")]
    NotReady {
        /// Which precondition is missing.
        reason: &'static str,
    },
}
