//! Volatile session-scoped storage.
//!
//! Key material only ever lives in storage scoped to one session: it
//! disappears with the tab/process and is never written to disk. The trait
//! exists so tests and embedders can supply their own scoping; the in-memory
//! implementation is the default.

use std::collections::HashMap;

/// Session-scoped string storage. Volatile by contract.
pub trait SessionStore {
    /// Read a value. `None` if absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any existing one.
    fn set(&mut self, key: &str, value: String);

    /// Remove a value if present.
    fn remove(&mut self, key: &str);
}

/// In-memory session store. Dropped with the owning session.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: HashMap<String, String>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut store = MemorySessionStore::new();
        assert!(store.get("k").is_none());

        store.set("k", "v".to_string());
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.set("k", "v2".to_string());
        assert_eq!(store.get("k").as_deref(), Some("v2"));

        store.remove("k");
        assert!(store.get("k").is_none());
    }
}
