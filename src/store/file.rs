//! File-based credential storage.

use super::{CredentialKey, CredentialRecord, CredentialStore};
use crate::error::AuthError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File permissions for the credential file (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Name of the credential document inside the storage directory.
const FILE_NAME: &str = "credentials.json";

/// File-based credential storage.
///
/// Persists all slots as one JSON object in `{dir}/credentials.json`. Every
/// read opens the file, so external edits are picked up without restarting.
///
/// # Security
/// - File permissions are set to 0600 (owner read/write only) on Unix
/// - Parent directories are created with 0700 permissions
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    /// Directory holding the credential file.
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Create a new FileCredentialStore rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the credential file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Ensure the storage directory exists with correct permissions.
    fn ensure_dir(&self) -> Result<(), AuthError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to create credential directory '{}': {}",
                    self.dir.display(),
                    e
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(DIR_MODE);
                std::fs::set_permissions(&self.dir, perms).map_err(|e| {
                    AuthError::Storage(format!(
                        "Failed to set directory permissions on '{}': {}",
                        self.dir.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Read the whole credential document. Absent file means an empty store.
    fn read_map(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let path = self.file_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(AuthError::Storage(format!(
                    "Failed to read credential file '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AuthError::Storage(format!(
                "Failed to parse credential file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the credential document atomically: temp file, then rename.
    /// On Unix, 0600 permissions are set at creation time so credentials
    /// are never readable by other users, even briefly.
    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), AuthError> {
        self.ensure_dir()?;

        let path = self.file_path();
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize credentials: {}", e)))?;

        let temp_path = path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| {
                    AuthError::Storage(format!(
                        "Failed to create temp file '{}': {}",
                        temp_path.display(),
                        e
                    ))
                })?;
            file.write_all(content.as_bytes()).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.sync_all().map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to sync temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, &content).map_err(|e| {
                AuthError::Storage(format!(
                    "Failed to write temp file '{}': {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename
        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(AuthError::Storage(format!(
                "Failed to rename '{}' to '{}': {}",
                temp_path.display(),
                path.display(),
                e
            )));
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        Ok(self.read_map()?.remove(key.as_str()))
    }

    #[instrument(skip(self, record))]
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        let mut map = BTreeMap::new();
        for (key, value) in record.entries() {
            map.insert(key.as_str().to_string(), value.to_string());
        }
        self.write_map(&map)
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<(), AuthError> {
        let path = self.file_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "Failed to remove credential file '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
