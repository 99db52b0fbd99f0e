//! The durable key-value substrate the cache writes through.
//!
//! Mirrors the host environment's storage surface: synchronous string
//! get/set/remove plus key enumeration so the cache can clear its own
//! namespace without touching unrelated keys.

use std::collections::BTreeMap;

use crate::error::Result;

/// Synchronous, local-only key-value storage.
///
/// In production: [`SqliteStorage`](crate::database::SqliteStorage).
/// In tests and embedded setups: [`MemoryStorage`].
pub trait KeyValueStorage: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&mut self, key: &str) -> Result<()>;

    /// Every key currently present. Needed for prefix enumerate-and-delete.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Volatile in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}
