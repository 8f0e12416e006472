//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The field is not stored in the session (or is pending deletion).
    #[error("Missing field: {0}")]
    MissingField(String),

    /// A stored field name or value is not valid UTF-8.
    #[error("Field is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No unused session identifier was found within the attempt budget.
    #[error("No free session identifier after {attempts} attempts")]
    IdExhausted { attempts: u32 },

    /// Error reported by a backing store implementation.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Error from the Redis client.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),
}

impl Error {
    /// Whether this is the recoverable "field not present" condition.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Error::MissingField(_))
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
