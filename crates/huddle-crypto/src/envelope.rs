//! Hybrid message encryption.
//!
//! One fresh AES-256-GCM key per outgoing message, wrapped under the
//! recipient's RSA-OAEP public key. The serialized envelope is base64 JSON
//! split into fixed-size chunks joined by a reserved separator, keeping each
//! transport unit under the relay's hard size ceiling.
//!
//! RSA alone cannot safely carry arbitrary-length data; the hybrid
//! composition pays one constant asymmetric operation per message no matter
//! how long the plaintext is. A legacy per-chunk RSA-only format is kept for
//! interop with older peers.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore, rngs::OsRng};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{b64_decode, b64_encode, error::CryptoError, keys::MAX_OAEP_PAYLOAD};

/// Maximum characters per transport chunk.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Chunk separator. Reserved: never appears in base64 or the envelope's
/// JSON framing, so splitting on it is unambiguous.
pub const CHUNK_SEPARATOR: char = '|';

/// Hard per-message transport ceiling enforced by the relay (32 KiB).
pub const MAX_TRANSPORT_BYTES: usize = 32 * 1024;

/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;

/// Serialized envelope: a wrapped symmetric key, a nonce, and ciphertext.
///
/// Field names are the wire contract; all three are base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    /// AES key, RSA-OAEP encrypted under the recipient's public key.
    key: String,
    /// 96-bit AES-GCM nonce.
    iv: String,
    /// AES-256-GCM ciphertext including the authentication tag.
    data: String,
}

/// Encrypt `plaintext` for `recipient`, returning the chunk-joined blob.
///
/// Uses the platform RNG. No network or storage side effects.
pub fn encrypt_message(plaintext: &str, recipient: &RsaPublicKey) -> Result<String, CryptoError> {
    encrypt_message_with_rng(plaintext, recipient, &mut OsRng)
}

/// [`encrypt_message`] with a caller-supplied RNG, for deterministic tests.
pub fn encrypt_message_with_rng<R: RngCore + CryptoRng>(
    plaintext: &str,
    recipient: &RsaPublicKey,
    rng: &mut R,
) -> Result<String, CryptoError> {
    // Fresh 256-bit symmetric key and 96-bit nonce per message.
    let mut key = Zeroizing::new([0u8; 32]);
    rng.fill_bytes(&mut *key);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| CryptoError::Encryption("AEAD encryption failed".to_string()))?;

    let wrapped_key = recipient
        .encrypt(rng, Oaep::new::<Sha256>(), key.as_slice())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let envelope = Envelope {
        key: b64_encode(&wrapped_key),
        iv: b64_encode(&nonce),
        data: b64_encode(&ciphertext),
    };
    let payload = serde_json::to_string(&envelope)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(join_chunks(&split_into_chunks(&payload)))
}

/// Decrypt a chunk-joined blob produced by [`encrypt_message`].
///
/// # Errors
///
/// - [`CryptoError::MalformedEnvelope`]: the rejoined payload does not parse
/// - [`CryptoError::DecryptionFailed`]: the wrapped key does not match
///   `own_private` (indistinguishable from tampering, by OAEP design)
/// - [`CryptoError::IntegrityFailure`]: the GCM tag check failed
pub fn decrypt_message(blob: &str, own_private: &RsaPrivateKey) -> Result<String, CryptoError> {
    let payload: String = blob.split(CHUNK_SEPARATOR).collect();
    let envelope: Envelope = serde_json::from_str(&payload)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;

    let wrapped_key = b64_decode(&envelope.key)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
    let nonce = b64_decode(&envelope.iv)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
    let ciphertext = b64_decode(&envelope.data)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }

    let unwrapped = Zeroizing::new(
        own_private
            .decrypt(Oaep::new::<Sha256>(), &wrapped_key)
            .map_err(|_| CryptoError::DecryptionFailed)?,
    );
    // Some peers wrap the base64 text of the session key rather than its
    // raw bytes. Accept both encodings.
    let key: Zeroizing<Vec<u8>> = if unwrapped.len() == 32 {
        unwrapped
    } else {
        std::str::from_utf8(&unwrapped)
            .ok()
            .and_then(|text| b64_decode(text).ok())
            .filter(|raw| raw.len() == 32)
            .map(Zeroizing::new)
            .ok_or(CryptoError::DecryptionFailed)?
    };

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::IntegrityFailure)?;

    String::from_utf8(plaintext).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
}

/// Encrypt in the legacy per-chunk format: the plaintext itself is cut at
/// the OAEP payload bound and every piece is RSA-encrypted independently.
///
/// Markedly more expensive than the hybrid form for long messages; kept
/// only for interop with peers that still speak it.
pub fn encrypt_direct(plaintext: &str, recipient: &RsaPublicKey) -> Result<String, CryptoError> {
    encrypt_direct_with_rng(plaintext, recipient, &mut OsRng)
}

/// [`encrypt_direct`] with a caller-supplied RNG.
pub fn encrypt_direct_with_rng<R: RngCore + CryptoRng>(
    plaintext: &str,
    recipient: &RsaPublicKey,
    rng: &mut R,
) -> Result<String, CryptoError> {
    let bytes = plaintext.as_bytes();
    // An empty plaintext still produces one chunk, so the blob is never
    // the empty string and decryption stays symmetric.
    let pieces: Vec<&[u8]> =
        if bytes.is_empty() { vec![&[]] } else { bytes.chunks(MAX_OAEP_PAYLOAD).collect() };

    let mut chunks = Vec::new();
    for piece in pieces {
        let encrypted = recipient
            .encrypt(rng, Oaep::new::<Sha256>(), piece)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        chunks.push(b64_encode(&encrypted));
    }
    Ok(join_chunks(&chunks))
}

/// Decrypt a legacy per-chunk blob, concatenating the recovered pieces.
pub fn decrypt_direct(blob: &str, own_private: &RsaPrivateKey) -> Result<String, CryptoError> {
    let mut plaintext = Vec::new();
    for chunk in blob.split(CHUNK_SEPARATOR) {
        let encrypted =
            b64_decode(chunk).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        let piece = own_private
            .decrypt(Oaep::new::<Sha256>(), &encrypted)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        plaintext.extend_from_slice(&piece);
    }
    String::from_utf8(plaintext).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
}

/// Cut an encoded payload into pieces of at most [`CHUNK_SIZE`] characters.
fn split_into_chunks(payload: &str) -> Vec<String> {
    payload
        .as_bytes()
        .chunks(CHUNK_SIZE)
        // The payload is base64 + JSON framing, so byte boundaries are
        // always character boundaries.
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

fn join_chunks(chunks: &[String]) -> String {
    chunks.join(&CHUNK_SEPARATOR.to_string())
}
