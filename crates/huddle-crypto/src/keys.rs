//! Asymmetric key pairs and their portable encodings.
//!
//! Keys are RSA-2048 used exclusively with OAEP/SHA-256. The public key
//! travels as base64 SPKI DER (the encoding peers exchange on join); the
//! private key is encoded as PKCS#8 DER and never leaves the client
//! unwrapped.

use rand::{CryptoRng, RngCore, rngs::OsRng};
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
};
use zeroize::Zeroizing;

use crate::{b64_decode, b64_encode, error::CryptoError};

/// RSA modulus size in bits.
pub const KEY_BITS: usize = 2048;

/// Largest plaintext one OAEP/SHA-256 operation can carry at 2048 bits
/// (modulus bytes minus 2 hash lengths minus 2).
pub const MAX_OAEP_PAYLOAD: usize = KEY_BITS / 8 - 2 * 32 - 2;

/// An asymmetric key pair, generated locally and owned by one client.
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl KeyPair {
    /// Generate a fresh pair from the platform RNG.
    ///
    /// # Errors
    ///
    /// [`CryptoError::CryptoUnsupported`] when the platform RNG is
    /// unavailable; [`CryptoError::KeyGeneration`] on generation failure.
    pub fn generate() -> Result<Self, CryptoError> {
        // Probe the RNG first so a missing entropy source surfaces as
        // CryptoUnsupported rather than a generation failure.
        let mut probe = [0u8; 1];
        OsRng.try_fill_bytes(&mut probe).map_err(|_| CryptoError::CryptoUnsupported)?;
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a fresh pair from a caller-supplied RNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(rng, KEY_BITS).map_err(CryptoError::KeyGeneration)?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { public, private })
    }

    /// Rebuild a pair from its portable encodings.
    ///
    /// `public` is base64 SPKI DER, `private_der` is raw PKCS#8 DER (already
    /// unwrapped by the caller).
    pub fn from_encodings(public: &str, private_der: &[u8]) -> Result<Self, CryptoError> {
        let public = import_public_key(public)?;
        let private = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))?;
        Ok(Self { public, private })
    }

    /// The public half.
    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    /// The private half.
    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Encode the public key as base64 SPKI DER for transport.
    pub fn export_public(&self) -> Result<String, CryptoError> {
        export_public_key(&self.public)
    }

    /// Encode the private key as PKCS#8 DER.
    ///
    /// The bytes are zeroed on drop; callers wrap them before persisting.
    pub fn export_private_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let doc = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyExport(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }
}

/// Encode any public key as base64 SPKI DER.
pub fn export_public_key(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key.to_public_key_der().map_err(|e| CryptoError::KeyExport(e.to_string()))?;
    Ok(b64_encode(der.as_bytes()))
}

/// Decode a base64 SPKI DER public key encoding.
pub fn import_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = b64_decode(encoded).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| CryptoError::KeyImport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_key_pair;

    #[test]
    fn public_key_encoding_round_trip() {
        let pair = test_key_pair();
        let encoded = pair.export_public().unwrap();
        let imported = import_public_key(&encoded).unwrap();
        assert_eq!(&imported, pair.public());
    }

    #[test]
    fn private_key_encoding_round_trip() {
        let pair = test_key_pair();
        let public = pair.export_public().unwrap();
        let private_der = pair.export_private_der().unwrap();

        let rebuilt = KeyPair::from_encodings(&public, &private_der).unwrap();
        assert_eq!(*rebuilt.export_private_der().unwrap(), *private_der);
        assert_eq!(rebuilt.public(), pair.public());
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(import_public_key("not base64 !!").is_err());
        assert!(import_public_key(&b64_encode(b"not a key")).is_err());
        assert!(KeyPair::from_encodings("AAAA", b"junk").is_err());
    }

    #[test]
    fn oaep_payload_bound_is_190() {
        assert_eq!(MAX_OAEP_PAYLOAD, 190);
    }
}
