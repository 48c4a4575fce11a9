//! Credential storage implementations.
//!
//! The session manager persists four fixed slots (access token, refresh
//! token, expiry, user profile) through the [`CredentialStore`] trait.
//! Backends are interchangeable; [`from_config`] picks one from
//! configuration.

pub mod file;
pub mod keyring;
pub mod memory;
pub mod sqlite;
pub mod trait_def;

// Re-exports
pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;
pub use trait_def::{CredentialKey, CredentialRecord, CredentialStore};

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringCredentialStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::AuthError;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the credential store selected by configuration.
///
/// A keyring selection falls back to the file backend when the keyring
/// feature is disabled or the platform store is unreachable, so a session
/// can always be persisted somewhere.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn CredentialStore>, AuthError> {
    let store: Arc<dyn CredentialStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        StorageBackend::File => Arc::new(FileCredentialStore::new(&config.dir)),
        StorageBackend::Sqlite => Arc::new(SqliteCredentialStore::open(&config.sqlite_path)?),
        StorageBackend::Keyring => {
            #[cfg(feature = "system-keyring")]
            {
                if KeyringCredentialStore::is_available() {
                    Arc::new(KeyringCredentialStore::new())
                } else {
                    warn!("System keyring unavailable, falling back to file storage");
                    Arc::new(FileCredentialStore::new(&config.dir))
                }
            }
            #[cfg(not(feature = "system-keyring"))]
            {
                warn!("Keyring support not compiled in, falling back to file storage");
                Arc::new(FileCredentialStore::new(&config.dir))
            }
        }
    };
    info!(backend = store.name(), "Credential store ready");
    Ok(store)
}
