//! Credential storage trait and fixed key set.

use crate::error::AuthError;
use crate::session::token::AuthBundle;
use chrono::SecondsFormat;
use std::sync::Arc;

/// The four persisted credential slots.
///
/// Keys are fixed; backends store opaque strings and never interpret them.
/// Parsing (expiry timestamp, profile JSON) happens in the session manager,
/// where a malformed value is treated the same as an absent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    ExpiresAt,
    UserData,
}

impl CredentialKey {
    /// All keys, in persistence order.
    pub const ALL: [CredentialKey; 4] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::ExpiresAt,
        CredentialKey::UserData,
    ];

    /// The storage key string for this slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "auth-token",
            Self::RefreshToken => "refresh-token",
            Self::ExpiresAt => "expires-at",
            Self::UserData => "user-data",
        }
    }
}

impl std::fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One full set of credential values, written atomically as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// RFC 3339 expiry instant.
    pub expires_at: String,
    /// Serialized user profile JSON.
    pub user_data: String,
}

impl CredentialRecord {
    /// Serialize a bundle into its stored representation.
    pub fn from_bundle(bundle: &AuthBundle) -> Result<Self, AuthError> {
        Ok(Self {
            access_token: bundle.access_token.clone(),
            refresh_token: bundle.refresh_token.clone(),
            expires_at: bundle
                .expires_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            user_data: serde_json::to_string(&bundle.user)?,
        })
    }

    /// Iterate the record as `(key, value)` pairs in persistence order.
    pub fn entries(&self) -> [(CredentialKey, &str); 4] {
        [
            (CredentialKey::AccessToken, self.access_token.as_str()),
            (CredentialKey::RefreshToken, self.refresh_token.as_str()),
            (CredentialKey::ExpiresAt, self.expires_at.as_str()),
            (CredentialKey::UserData, self.user_data.as_str()),
        ]
    }
}

/// Trait for credential storage backends.
///
/// All implementations must be thread-safe (`Send + Sync`). The store is the
/// source of truth for the session: reads go through it on every call rather
/// than being cached in memory.
pub trait CredentialStore: Send + Sync {
    /// Read a single credential slot. `None` when unset.
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError>;

    /// Replace all four slots with the given record.
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError>;

    /// Remove all four slots. Clearing an already-empty store succeeds.
    fn clear(&self) -> Result<(), AuthError>;

    /// Check whether a slot holds a value.
    fn exists(&self, key: CredentialKey) -> Result<bool, AuthError> {
        Ok(self.get(key)?.is_some())
    }

    /// Get the name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        (**self).get(key)
    }
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        (**self).put_all(record)
    }
    fn clear(&self) -> Result<(), AuthError> {
        (**self).clear()
    }
    fn exists(&self, key: CredentialKey) -> Result<bool, AuthError> {
        (**self).exists(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// Blanket implementation for Box<T>
impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        (**self).get(key)
    }
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        (**self).put_all(record)
    }
    fn clear(&self) -> Result<(), AuthError> {
        (**self).clear()
    }
    fn exists(&self, key: CredentialKey) -> Result<bool, AuthError> {
        (**self).exists(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
