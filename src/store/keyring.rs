//! Keyring-based credential storage.

#[cfg(feature = "system-keyring")]
use super::{CredentialKey, CredentialRecord, CredentialStore};
#[cfg(feature = "system-keyring")]
use crate::error::AuthError;
#[cfg(feature = "system-keyring")]
use tracing::instrument;

/// Keyring-based credential storage.
///
/// Uses the system's native credential store, one entry per credential slot.
///
/// Feature-gated behind `system-keyring`.
#[cfg(feature = "system-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    /// Service name for keyring entries.
    service: String,
}

#[cfg(feature = "system-keyring")]
impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system-keyring")]
impl KeyringCredentialStore {
    /// Service name prefix for keyring entries.
    const SERVICE_NAME: &str = "hasp-session";

    /// Create a new KeyringCredentialStore with the default service name.
    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    /// Create a KeyringCredentialStore with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check if the system keyring is available.
    pub fn is_available() -> bool {
        match keyring::Entry::new("hasp-test", "availability-check") {
            Ok(entry) => match entry.get_password() {
                Ok(_) => true,
                Err(keyring::Error::NoEntry) => true,
                Err(keyring::Error::NoStorageAccess(_)) => false,
                Err(keyring::Error::PlatformFailure(_)) => false,
                Err(_) => true,
            },
            Err(_) => false,
        }
    }

    /// Get the keyring entry for a credential slot.
    fn entry(&self, key: CredentialKey) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(&self.service, key.as_str())
            .map_err(|e| AuthError::Storage(format!("Failed to create keyring entry: {}", e)))
    }
}

#[cfg(feature = "system-keyring")]
impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Keyring error: {}", e))),
        }
    }

    #[instrument(skip(self, record))]
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        for (key, value) in record.entries() {
            self.entry(key)?
                .set_password(value)
                .map_err(|e| AuthError::Storage(format!("Keyring error: {}", e)))?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<(), AuthError> {
        for key in CredentialKey::ALL {
            match self.entry(key)?.delete_credential() {
                Ok(()) => {}
                Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(AuthError::Storage(format!("Keyring error: {}", e))),
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
