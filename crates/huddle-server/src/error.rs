//! Server runtime errors.

use std::net::AddrParseError;

use thiserror::Error;

/// Errors raised while standing up or running the relay runtime.
///
/// Protocol-level failures never appear here; those travel to clients as
/// typed `error` frames produced by the driver.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address did not parse.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(#[from] AddrParseError),

    /// Socket setup or serving failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
