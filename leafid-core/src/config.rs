//! Pipeline configuration
//!
//! Loaded from environment variables; every field has a default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::backend::BackendKind;
use crate::error::{LeafError, Result, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_IMAGE_BYTES};
use crate::history::HISTORY_ENTRY;
use crate::identify::{
    IdentifierConfig, PlantIdConfig, DEFAULT_MOCK_DELAY, DEFAULT_MOCK_SEED,
    DEFAULT_PLANT_ID_API_URL,
};
use crate::storage::StorageConfig;

/// File holding the identity provider's access token.
pub const SESSION_FILE: &str = "session.jwt";

pub const DEFAULT_STORAGE_BUCKET: &str = "plant-images";

/// Which species identifier to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierKind {
    #[default]
    Mock,
    PlantId,
}

impl FromStr for IdentifierKind {
    type Err = LeafError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "plant-id" | "plantid" | "plant.id" => Ok(Self::PlantId),
            other => Err(LeafError::Config(format!(
                "unknown identifier '{other}' (expected mock or plant-id)"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Backend kind (default: local)
    pub backend: BackendKind,
    /// Directory for local history and the session token
    pub data_dir: PathBuf,
    /// Local history capacity (default: 20)
    pub history_limit: usize,
    /// Maximum accepted image size in bytes (default: 10 MB)
    pub max_image_bytes: usize,
    pub identifier: IdentifierKind,
    /// Artificial latency of the mock identifier (default: 2000 ms)
    pub mock_delay: Duration,
    pub plant_id_api_url: String,
    /// Transport timeout for outbound HTTP (default: 30 s)
    pub http_timeout: Duration,
    pub database_url: Option<String>,
    /// Database pool maximum connections (default: 5)
    pub database_max_connections: u32,
    /// How long a query waits for a database connection (default: 10 s)
    pub database_acquire_timeout: Duration,
    pub storage_url: Option<String>,
    pub storage_bucket: String,
    pub storage_api_key: Option<String>,
    /// HS256 secret used to validate access tokens
    pub jwt_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            data_dir: default_data_dir(None),
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            identifier: IdentifierKind::Mock,
            mock_delay: DEFAULT_MOCK_DELAY,
            plant_id_api_url: DEFAULT_PLANT_ID_API_URL.to_string(),
            http_timeout: Duration::from_secs(30),
            database_url: None,
            database_max_connections: 5,
            database_acquire_timeout: Duration::from_secs(10),
            storage_url: None,
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            storage_api_key: None,
            jwt_secret: None,
        }
    }
}

fn default_data_dir(home: Option<String>) -> PathBuf {
    match home.filter(|h| !h.trim().is_empty()) {
        Some(home) => PathBuf::from(home).join(".leafid"),
        None => PathBuf::from(".leafid"),
    }
}

/// `None` when the byte count does not fit in `usize`.
fn megabytes_to_bytes(mb: u64) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Unparseable numbers fall back to their defaults; an unknown backend
    /// or identifier name is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        let backend = match var("LEAFID_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.backend,
        };

        let identifier = match var("LEAFID_IDENTIFIER") {
            Some(v) => v.parse()?,
            None => defaults.identifier,
        };

        let data_dir = var("LEAFID_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(lookup("HOME")));

        let history_limit = parsed("LEAFID_HISTORY_LIMIT")
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.history_limit);

        let max_image_bytes = parsed("LEAFID_MAX_IMAGE_MB")
            .filter(|n| *n > 0)
            .and_then(megabytes_to_bytes)
            .unwrap_or(defaults.max_image_bytes);

        let mock_delay = parsed("LEAFID_MOCK_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.mock_delay);

        let http_timeout = parsed("LEAFID_HTTP_TIMEOUT_SECS")
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS")
            .filter(|n| *n > 0)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(defaults.database_max_connections);

        let database_acquire_timeout = parsed("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.database_acquire_timeout);

        Ok(Self {
            backend,
            data_dir,
            history_limit,
            max_image_bytes,
            identifier,
            mock_delay,
            plant_id_api_url: var("PLANT_ID_API_URL").unwrap_or(defaults.plant_id_api_url),
            http_timeout,
            database_url: var("DATABASE_URL"),
            database_max_connections,
            database_acquire_timeout,
            storage_url: var("STORAGE_URL"),
            storage_bucket: var("STORAGE_BUCKET").unwrap_or(defaults.storage_bucket),
            storage_api_key: var("STORAGE_API_KEY"),
            jwt_secret: var("AUTH_JWT_SECRET"),
        })
    }

    /// `<data_dir>/plant-history.json`
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(format!("{HISTORY_ENTRY}.json"))
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }

    pub fn identifier_config(&self) -> IdentifierConfig {
        match self.identifier {
            IdentifierKind::Mock => IdentifierConfig::Mock {
                seed: DEFAULT_MOCK_SEED,
                delay: self.mock_delay,
            },
            IdentifierKind::PlantId => IdentifierConfig::PlantId(PlantIdConfig {
                api_url: self.plant_id_api_url.clone(),
                timeout: self.http_timeout,
            }),
        }
    }

    /// Object storage settings, if both URL and key are configured.
    pub fn storage_config(&self) -> Option<StorageConfig> {
        Some(StorageConfig {
            url: self.storage_url.clone()?,
            bucket: self.storage_bucket.clone(),
            api_key: Zeroizing::new(self.storage_api_key.clone()?),
            timeout: self.http_timeout,
        })
    }

    #[cfg(feature = "hosted")]
    pub fn token_session(&self) -> Result<crate::session::TokenSession> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| LeafError::Config("AUTH_JWT_SECRET is not set".into()))?;
        Ok(crate::session::TokenSession::new(self.session_path(), secret))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("data_dir", &self.data_dir)
            .field("history_limit", &self.history_limit)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("identifier", &self.identifier)
            .field("mock_delay", &self.mock_delay)
            .field("plant_id_api_url", &self.plant_id_api_url)
            .field("http_timeout", &self.http_timeout)
            .field("database_url", &redact(&self.database_url))
            .field("database_max_connections", &self.database_max_connections)
            .field("database_acquire_timeout", &self.database_acquire_timeout)
            .field("storage_url", &self.storage_url)
            .field("storage_bucket", &self.storage_bucket)
            .field("storage_api_key", &redact(&self.storage_api_key))
            .field("jwt_secret", &redact(&self.jwt_secret))
            .finish()
    }
}
