//! Cryptographic core for huddle.
//!
//! Three layers, all sans-IO:
//!
//! - [`keys`]: RSA-2048 OAEP/SHA-256 key pairs and portable encodings
//! - [`envelope`]: per-message hybrid encryption (fresh AES-256-GCM key
//!   wrapped under the recipient's public key), chunked for transport
//! - [`fingerprint`]: at-rest wrapping of the private key under a
//!   deterministic, environment-derived key
//!
//! Nothing in this crate touches the network or storage; key persistence
//! lives in `huddle-client`, transport in `huddle-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod envelope;
pub mod fingerprint;
pub mod keys;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
pub use envelope::{
    CHUNK_SEPARATOR, CHUNK_SIZE, MAX_TRANSPORT_BYTES, decrypt_direct, decrypt_message,
    encrypt_direct, encrypt_message,
};
pub use error::CryptoError;
pub use fingerprint::{FingerprintSignals, KeyWrapper};
pub use keys::{KEY_BITS, KeyPair, MAX_OAEP_PAYLOAD, export_public_key, import_public_key};
pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// Standard base64 used for every transport-safe encoding in the protocol.
pub(crate) fn b64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub(crate) fn b64_decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(encoded.trim())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures. RSA keygen is expensive, so tests reuse one pair.

    use std::sync::OnceLock;

    use rand::{SeedableRng, rngs::StdRng};

    use crate::KeyPair;

    pub fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    pub fn test_key_pair() -> &'static KeyPair {
        static PAIR: OnceLock<KeyPair> = OnceLock::new();
        PAIR.get_or_init(|| {
            KeyPair::generate_with_rng(&mut seeded_rng(0x6875_6464)).unwrap()
        })
    }
}
