//! SQLite-backed credential storage.

use super::{CredentialKey, CredentialRecord, CredentialStore};
use crate::error::AuthError;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::instrument;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    key     TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);
"#;

/// SQLite-backed credential storage.
///
/// Useful when the host application already keeps its state in SQLite and
/// wants credentials in the same database file.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open or create the credential database at the given path.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(store)
    }

    /// Open an in-memory credential database (for testing).
    pub fn open_in_memory() -> Result<Self, AuthError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.with_conn(|conn| conn.execute_batch(SCHEMA))?;
        Ok(store)
    }

    /// Execute a closure with access to the database connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T, rusqlite::Error>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self.conn.lock().expect("database mutex poisoned");
        f(&conn)
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, AuthError> {
        let value = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM credentials WHERE key = ?1",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(value)
    }

    #[instrument(skip(self, record))]
    fn put_all(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        // Single statement, so a crash never leaves half a record.
        let [a, r, e, u] = record.entries();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials (key, value)
                 VALUES (?1, ?2), (?3, ?4), (?5, ?6), (?7, ?8)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![
                    a.0.as_str(),
                    a.1,
                    r.0.as_str(),
                    r.1,
                    e.0.as_str(),
                    e.1,
                    u.0.as_str(),
                    u.1
                ],
            )
            .map(|_| ())
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn clear(&self) -> Result<(), AuthError> {
        self.with_conn(|conn| conn.execute("DELETE FROM credentials", []).map(|_| ()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CredentialRecord {
        CredentialRecord {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: "2026-08-25T12:00:00Z".into(),
            user_data: r#"{"username":"frodo","roles":["USER"]}"#.into(),
        }
    }

    #[test]
    fn test_sqlite_put_all_and_get() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        assert!(store.get(CredentialKey::AccessToken).unwrap().is_none());

        store.put_all(&record()).unwrap();
        assert_eq!(
            store.get(CredentialKey::AccessToken).unwrap().as_deref(),
            Some("access")
        );
        assert_eq!(
            store.get(CredentialKey::UserData).unwrap().as_deref(),
            Some(r#"{"username":"frodo","roles":["USER"]}"#)
        );
    }

    #[test]
    fn test_sqlite_overwrite() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.put_all(&record()).unwrap();

        let next = CredentialRecord {
            access_token: "access2".into(),
            ..record()
        };
        store.put_all(&next).unwrap();
        assert_eq!(
            store.get(CredentialKey::AccessToken).unwrap().as_deref(),
            Some("access2")
        );
    }

    #[test]
    fn test_sqlite_clear_idempotent() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.put_all(&record()).unwrap();
        store.clear().unwrap();
        assert!(store.get(CredentialKey::RefreshToken).unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_sqlite_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.db");

        {
            let store = SqliteCredentialStore::open(&path).unwrap();
            store.put_all(&record()).unwrap();
        }

        // Reopen and confirm the record survived.
        let store = SqliteCredentialStore::open(&path).unwrap();
        assert_eq!(
            store.get(CredentialKey::ExpiresAt).unwrap().as_deref(),
            Some("2026-08-25T12:00:00Z")
        );
    }
}
