//! Error types for session and credential operations.

/// Errors that can occur across the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend rejected the request with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP client error (connect, timeout, body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credential storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload (de)serialization error.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// No usable credentials are present.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// HTTP status carried by this error, when it originated from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the backend explicitly rejected the credentials (401).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
