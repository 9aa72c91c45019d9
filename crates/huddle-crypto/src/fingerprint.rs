//! Local key wrapping from an environment fingerprint.
//!
//! The wrapping key is derived from locally observable, non-secret signals.
//! It deters casual inspection of session-scoped storage; anyone with
//! equivalent environment access can re-derive it. It is NOT a
//! cryptographic secret and nothing here pretends otherwise.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{b64_decode, b64_encode, error::CryptoError};

/// Fixed KDF salt. Secrecy is not a goal here, stability across sessions is.
const KDF_SALT: &[u8] = b"huddle-fingerprint-v1";

/// PBKDF2-HMAC-SHA256 iteration count.
const KDF_ITERATIONS: u32 = 100_000;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Environment signals fed into the fingerprint.
///
/// All fields are observable without privileges. `network_marker` is an
/// opt-in deployment choice (e.g. a public IP): including it weakens the
/// local-only property of the derivation and defaults to `None`.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSignals {
    /// Platform/user-agent style identification string.
    pub platform: String,
    /// IANA timezone name.
    pub timezone: String,
    /// Logical processor count.
    pub hardware_concurrency: usize,
    /// Optional canvas/audio style rendering signature.
    pub render_signature: Option<String>,
    /// Optional network-visible signal. Off by default; see module docs.
    pub network_marker: Option<String>,
}

impl FingerprintSignals {
    /// Collect signals from the running host.
    pub fn from_host() -> Self {
        Self {
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            timezone: std::env::var("TZ").unwrap_or_default(),
            hardware_concurrency: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
            render_signature: None,
            network_marker: None,
        }
    }
}

/// Wraps and unwraps byte strings under a fingerprint-derived key.
#[derive(Debug, Clone)]
pub struct KeyWrapper {
    key: Zeroizing<[u8; 32]>,
}

impl KeyWrapper {
    /// Derive the wrapping key from the given signals.
    ///
    /// Signals are joined, hashed, then stretched with PBKDF2 over a fixed
    /// salt and iteration count. Deterministic: the same environment
    /// reproduces the same key.
    pub fn derive(signals: &FingerprintSignals) -> Self {
        let mut components = vec![
            signals.platform.clone(),
            signals.timezone.clone(),
            signals.hardware_concurrency.to_string(),
        ];
        if let Some(render) = &signals.render_signature {
            components.push(render.clone());
        }
        if let Some(marker) = &signals.network_marker {
            components.push(marker.clone());
        }

        let digest = Sha256::digest(components.join("||").as_bytes());
        let fingerprint_hex = hex_encode(&digest);

        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2_hmac::<Sha256>(
            fingerprint_hex.as_bytes(),
            KDF_SALT,
            KDF_ITERATIONS,
            &mut *key,
        );
        Self { key }
    }

    /// Authenticate-encrypt `plaintext`, returning base64 of nonce ‖ ciphertext.
    pub fn wrap(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| CryptoError::CryptoUnsupported)?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encryption("AEAD encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(b64_encode(&blob))
    }

    /// Authenticate-decrypt a [`wrap`](Self::wrap) blob.
    ///
    /// Returns `None` when the derived key does not reproduce the original
    /// (environment changed, blob corrupt). Never returns an error across
    /// this boundary: callers treat `None` as "wrapped material unavailable"
    /// and regenerate.
    pub fn unwrap(&self, blob: &str) -> Option<Zeroizing<Vec<u8>>> {
        let bytes = b64_decode(blob).ok()?;
        if bytes.len() < NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()));
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        Some(Zeroizing::new(plaintext))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> FingerprintSignals {
        FingerprintSignals {
            platform: "linux-x86_64".to_string(),
            timezone: "Europe/Vienna".to_string(),
            hardware_concurrency: 8,
            render_signature: Some("mesa~llvmpipe".to_string()),
            network_marker: None,
        }
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let wrapper = KeyWrapper::derive(&signals());
        let blob = wrapper.wrap(b"private key material").unwrap();
        let recovered = wrapper.unwrap(&blob).unwrap();
        assert_eq!(recovered.as_slice(), b"private key material");
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = KeyWrapper::derive(&signals());
        let b = KeyWrapper::derive(&signals());
        let blob = a.wrap(b"material").unwrap();
        assert!(b.unwrap(&blob).is_some());
    }

    #[test]
    fn changed_environment_yields_none() {
        let wrapper = KeyWrapper::derive(&signals());
        let blob = wrapper.wrap(b"material").unwrap();

        let mut other = signals();
        other.hardware_concurrency = 4;
        let mismatched = KeyWrapper::derive(&other);
        assert!(mismatched.unwrap(&blob).is_none());
    }

    #[test]
    fn network_marker_changes_the_key() {
        let local = KeyWrapper::derive(&signals());
        let mut with_ip = signals();
        with_ip.network_marker = Some("203.0.113.7".to_string());
        let networked = KeyWrapper::derive(&with_ip);

        let blob = local.wrap(b"material").unwrap();
        assert!(networked.unwrap(&blob).is_none());
    }

    #[test]
    fn corrupt_blob_yields_none_not_panic() {
        let wrapper = KeyWrapper::derive(&signals());
        assert!(wrapper.unwrap("!!not-base64!!").is_none());
        assert!(wrapper.unwrap("AAAA").is_none());

        let blob = wrapper.wrap(b"material").unwrap();
        let mut bytes = blob.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert!(wrapper.unwrap(&tampered).is_none());
    }
}
