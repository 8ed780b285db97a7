//! Snapshot storage behind the mirror store.

use std::collections::HashMap;

/// Keyed blob storage for mirror snapshots. Each collection is serialized as
/// one JSON document under its own key.
pub trait SnapshotStorage: Send {
    /// Load the blob stored under `key`, if any.
    fn load(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous blob.
    fn store(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Remove the blob stored under `key`.
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// Volatile storage. The default backing for tests and for deployments that
/// treat the mirror as a pure cache.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.blobs.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.blobs.remove(key);
        Ok(())
    }
}
