//! Configuration for the session store.
//!
//! ```toml
//! host = "localhost"
//! port = 6379
//! db = 0
//! namespace = "vial"
//! expires_secs = 86400        # 0 = never expire
//! user_expires_secs = 604800  # 0 = never expire
//! key_length = 256
//! max_id_attempts = 16
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ttl::{DEFAULT_EXPIRES, DEFAULT_USER_EXPIRES, Expiry};

/// Default number of random bytes in a generated session identifier.
pub const DEFAULT_KEY_LENGTH: usize = 256;

/// Default number of identifier candidates tried before giving up.
pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 16;

/// Per-session settings injected by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Optional key prefix.
    pub namespace: Option<String>,

    /// Expiration applied on refresh.
    pub expires: Expiry,

    /// Expiration applied instead of `expires` once a user is bound.
    pub user_expires: Expiry,

    /// Random bytes per generated identifier.
    pub key_length: usize,

    /// Identifier candidates tried on save before failing.
    pub max_id_attempts: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            expires: Expiry::After(DEFAULT_EXPIRES),
            user_expires: Expiry::After(DEFAULT_USER_EXPIRES),
            key_length: DEFAULT_KEY_LENGTH,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }
}

impl SessionOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the anonymous session expiry.
    pub fn with_expires(mut self, expires: Expiry) -> Self {
        self.expires = expires;
        self
    }

    /// Set the user-bound session expiry.
    pub fn with_user_expires(mut self, expires: Expiry) -> Self {
        self.user_expires = expires;
        self
    }

    /// Set the identifier length in random bytes.
    pub fn with_key_length(mut self, len: usize) -> Self {
        self.key_length = len;
        self
    }

    /// Set the identifier generation attempt budget.
    pub fn with_max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }
}

/// Store configuration as read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing store host.
    pub host: String,

    /// Backing store port.
    pub port: u16,

    /// Database index.
    pub db: i64,

    /// Optional key prefix.
    pub namespace: Option<String>,

    /// Anonymous session lifetime in seconds (0 = never expire).
    pub expires_secs: u64,

    /// User-bound session lifetime in seconds (0 = never expire).
    pub user_expires_secs: u64,

    /// Random bytes per generated identifier.
    pub key_length: usize,

    /// Identifier candidates tried on save before failing.
    pub max_id_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            namespace: None,
            expires_secs: DEFAULT_EXPIRES.as_secs(),
            user_expires_secs: DEFAULT_USER_EXPIRES.as_secs(),
            key_length: DEFAULT_KEY_LENGTH,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }
}

impl StoreConfig {
    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// URL of the backing store endpoint.
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }

    /// Session options derived from this config.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            expires: Expiry::from_secs(self.expires_secs),
            user_expires: Expiry::from_secs(self.user_expires_secs),
            key_length: self.key_length,
            max_id_attempts: self.max_id_attempts,
        }
    }
}

/// Load a config file from disk.
pub fn load_config_file(path: &Path) -> Result<StoreConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ReadConfig {
        path: path.display().to_string(),
        source: e,
    })?;
    StoreConfig::from_toml(&content)
}
