use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL all endpoint paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Seconds before expiry at which a token counts as due for refresh.
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_secs: u64,
    /// Upper bound on how long `initialize` waits for translations to load.
    #[serde(default = "default_locale_timeout")]
    pub locale_ready_timeout_ms: u64,
}

impl SessionConfig {
    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_secs as i64)
    }

    pub fn locale_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.locale_ready_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_buffer_secs: default_refresh_buffer(),
            locale_ready_timeout_ms: default_locale_timeout(),
        }
    }
}

/// In-app navigation targets used by logout flows and gates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutesConfig {
    #[serde(default = "default_login_route")]
    pub login: String,
    #[serde(default = "default_home_route")]
    pub home: String,
    #[serde(default = "default_root_route")]
    pub root: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            login: default_login_route(),
            home: default_home_route(),
            root: default_root_route(),
        }
    }
}

/// Backend endpoint paths and the public allowlist for response recovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_login_endpoint")]
    pub login: String,
    #[serde(default = "default_register_endpoint")]
    pub register: String,
    #[serde(default = "default_refresh_endpoint")]
    pub refresh: String,
    /// Paths ending in one of these never trigger session recovery.
    #[serde(default = "default_public_suffixes")]
    pub public_suffixes: Vec<String>,
    /// Paths starting with one of these never trigger session recovery.
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: default_login_endpoint(),
            register: default_register_endpoint(),
            refresh: default_refresh_endpoint(),
            public_suffixes: default_public_suffixes(),
            public_prefixes: default_public_prefixes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Directory for the file backend.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    /// Database path for the sqlite backend.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            dir: default_storage_dir(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("Unknown storage backend: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}
const fn default_connect_timeout() -> u64 {
    10
}
const fn default_request_timeout() -> u64 {
    30
}
const fn default_refresh_buffer() -> u64 {
    30
}
const fn default_locale_timeout() -> u64 {
    1000
}
fn default_login_route() -> String {
    "/auth/login".to_string()
}
fn default_home_route() -> String {
    "/home".to_string()
}
fn default_root_route() -> String {
    "/".to_string()
}
fn default_login_endpoint() -> String {
    "/login".to_string()
}
fn default_register_endpoint() -> String {
    "/register".to_string()
}
fn default_refresh_endpoint() -> String {
    "/refresh-token".to_string()
}
fn default_public_suffixes() -> Vec<String> {
    vec![
        "/login".to_string(),
        "/register".to_string(),
        "/refresh-token".to_string(),
    ]
}
fn default_public_prefixes() -> Vec<String> {
    vec!["/assets/i18n/".to_string()]
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_storage_dir() -> PathBuf {
    dirs_default_storage().join("credentials")
}
fn default_sqlite_path() -> PathBuf {
    dirs_default_storage().join("hasp.db")
}
fn dirs_default_storage() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hasp")
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting with a `HASP_` env var takes precedence over
    /// the file value.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        macro_rules! env_str {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                }
            };
        }
        macro_rules! env_parse {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                    }
                }
            };
        }
        macro_rules! env_path {
            ($env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                }
            };
        }

        env_str!("HASP_API_BASE_URL", self.api.base_url);
        env_parse!("HASP_API_REQUEST_TIMEOUT", self.api.request_timeout_secs);
        env_parse!("HASP_SESSION_REFRESH_BUFFER", self.session.refresh_buffer_secs);
        env_parse!(
            "HASP_SESSION_LOCALE_TIMEOUT_MS",
            self.session.locale_ready_timeout_ms
        );
        env_parse!("HASP_STORAGE_BACKEND", self.storage.backend);
        env_path!("HASP_STORAGE_DIR", self.storage.dir);
        env_path!("HASP_STORAGE_SQLITE_PATH", self.storage.sqlite_path);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            routes: RoutesConfig::default(),
            endpoints: EndpointsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

// Helper for default storage directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
