//! Crypto error types.

/// Errors from key management and message encryption.
///
/// Callers treat every variant as aborting the operation in progress; no
/// partial envelope or key state is ever committed on failure.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The platform offers no usable source of cryptographic randomness.
    #[error("cryptographic primitives unavailable on this platform")]
    CryptoUnsupported,

    /// Key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(rsa::Error),

    /// A key could not be encoded to its portable byte form.
    #[error("key export failed: {0}")]
    KeyExport(String),

    /// A stored key encoding was corrupt or mismatched.
    ///
    /// Callers treat this as "no keys" and regenerate, never as fatal.
    #[error("key import failed: {0}")]
    KeyImport(String),

    /// The envelope could not be parsed after rejoining chunks.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Asymmetric unwrap of the symmetric key failed. OAEP does not
    /// distinguish a wrong key from a tampered blob.
    #[error("decryption failed: wrapped key does not match private key")]
    DecryptionFailed,

    /// Authenticated decryption of the payload failed (tag mismatch).
    #[error("integrity failure: ciphertext authentication failed")]
    IntegrityFailure,

    /// Encryption of the payload failed.
    #[error("encryption failed: {0}")]
    Encryption(String),
}
