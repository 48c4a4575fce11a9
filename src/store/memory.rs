//! In-memory credential storage.

use super::{CredentialKey, CredentialRecord, CredentialStore};
use crate::error::AuthError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::instrument;

/// In-memory credential storage.
///
/// Uses `Arc<RwLock<HashMap>>` for thread-safe access. Useful for testing
/// and ephemeral sessions. The storage is Clone and can be shared across
/// the application.
#[derive(Debug, Clone)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<HashMap<CredentialKey, String>>>,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCredentialStore {
    /// Create a new empty MemoryCredentialStore.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a MemoryCredentialStore pre-populated with a record.
    pub fn with_record(record: &CredentialRecord) -> Self {
        let mut map = HashMap::new();
        for (key, value) in record.entries() {
            map.insert(key, value.to_string());
        }
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").len()
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").is_empty()
    }

    /// Overwrite a single slot, bypassing the whole-record write path.
    /// Intended for tests simulating partial or tampered state.
    pub fn put_raw(&self, key: CredentialKey, value: impl Into<String>) {
        self.inner
            .write()
            .expect("lock poisoned")
            .insert(key, value.into());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        let guard = self.inner.read().expect("lock poisoned");
        Ok(guard.get(&key).cloned())
    }

    #[instrument(skip(self, record))]
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        let mut guard = self.inner.write().expect("lock poisoned");
        for (key, value) in record.entries() {
            guard.insert(key, value.to_string());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<(), AuthError> {
        self.inner.write().expect("lock poisoned").clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
