//! Key lifecycle management.
//!
//! Generates, persists, loads, rotates, and erases the client's key pair.
//! The private key is wrapped under the fingerprint-derived key before it
//! touches the session store, and a record older than the rotation interval
//! is never reused. All methods take `now` explicitly: the caller owns time,
//! which keeps rotation and expiry deterministic under test.

use std::time::Duration;

use huddle_crypto::{CryptoError, FingerprintSignals, KeyPair, KeyWrapper};
use serde::{Deserialize, Serialize};

use crate::{error::ClientError, store::SessionStore};

/// How long a stored key pair stays valid (deployment decision: 30 min).
pub const KEY_ROTATION_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Session-store key under which the record lives.
const STORAGE_KEY: &str = "huddle.keys";

/// The persisted shape of a key pair at rest.
///
/// Only ever written to volatile session-scoped storage. The private key is
/// present solely in wrapped form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeyRecord {
    /// Base64 SPKI encoding of the public key.
    pub public_key: String,
    /// Fingerprint-wrapped PKCS#8 private key.
    pub wrapped_private_key: String,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
}

/// Outcome of [`KeyLifecycle::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// A valid pair was recovered from storage.
    Keys(Box<KeyPair>),
    /// No record was present, or its wrapping could not be reversed.
    Absent,
    /// The record outlived the rotation interval and was erased. Callers
    /// should regenerate and may surface a session-expired notice.
    Expired,
}

/// Manages the client's key pair across its whole lifetime.
pub struct KeyLifecycle<S: SessionStore> {
    store: S,
    wrapper: KeyWrapper,
    rotation_interval: Duration,
}

impl<S: SessionStore> KeyLifecycle<S> {
    /// Create a lifecycle manager over the given store and environment
    /// signals.
    pub fn new(store: S, signals: &FingerprintSignals) -> Self {
        Self {
            store,
            wrapper: KeyWrapper::derive(signals),
            rotation_interval: KEY_ROTATION_INTERVAL,
        }
    }

    /// Override the rotation interval (tests, alternate deployments).
    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Generate a fresh pair. Does not persist it; see [`store`](Self::store).
    pub fn generate(&self) -> Result<KeyPair, CryptoError> {
        KeyPair::generate()
    }

    /// Persist a pair: public key encoded for transport, private key
    /// wrapped under the fingerprint key, stamped with `now_ms`.
    pub fn store(&mut self, pair: &KeyPair, now_ms: u64) -> Result<(), ClientError> {
        let record = StoredKeyRecord {
            public_key: pair.export_public()?,
            wrapped_private_key: self.wrapper.wrap(&pair.export_private_der()?)?,
            created_at: now_ms,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| ClientError::CorruptRecord(e.to_string()))?;
        self.store.set(STORAGE_KEY, json);
        Ok(())
    }

    /// Recover the stored pair, enforcing the rotation interval.
    ///
    /// A record that fails to parse or unwrap is erased and reported as
    /// [`LoadOutcome::Absent`]; corruption is never fatal here.
    pub fn load(&mut self, now_ms: u64) -> LoadOutcome {
        let Some(json) = self.store.get(STORAGE_KEY) else {
            return LoadOutcome::Absent;
        };

        let Ok(record) = serde_json::from_str::<StoredKeyRecord>(&json) else {
            self.cleanup();
            return LoadOutcome::Absent;
        };

        let age_ms = now_ms.saturating_sub(record.created_at);
        if age_ms > self.rotation_interval.as_millis() as u64 {
            self.cleanup();
            return LoadOutcome::Expired;
        }

        let Some(private_der) = self.wrapper.unwrap(&record.wrapped_private_key) else {
            // Fingerprint no longer reproduces the wrapping key.
            self.cleanup();
            return LoadOutcome::Absent;
        };

        match KeyPair::from_encodings(&record.public_key, &private_der) {
            Ok(pair) => LoadOutcome::Keys(Box::new(pair)),
            Err(_) => {
                self.cleanup();
                LoadOutcome::Absent
            },
        }
    }

    /// Return a valid pair, generating and persisting a new one when the
    /// stored record is absent or expired.
    ///
    /// The boolean is `true` when the previous record had expired (callers
    /// may surface a session-expired notice).
    pub fn rotate(&mut self, now_ms: u64) -> Result<(KeyPair, bool), ClientError> {
        let expired = match self.load(now_ms) {
            LoadOutcome::Keys(pair) => return Ok((*pair, false)),
            LoadOutcome::Absent => false,
            LoadOutcome::Expired => true,
        };
        let pair = self.generate()?;
        self.store(&pair, now_ms)?;
        Ok((pair, expired))
    }

    /// Erase the stored record unconditionally (logout, teardown,
    /// inactivity).
    pub fn cleanup(&mut self) {
        self.store.remove(STORAGE_KEY);
    }

    /// Direct access to the raw stored record, if any.
    pub fn record(&self) -> Option<StoredKeyRecord> {
        self.store
            .get(STORAGE_KEY)
            .and_then(|json| serde_json::from_str(&json).ok())
    }
}
