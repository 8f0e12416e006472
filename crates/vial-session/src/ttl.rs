//! Expiration policy for session keys.

use std::time::Duration;

use tracing::trace;

use crate::backend::Backend;
use crate::error::Result;

/// Default lifetime of an anonymous session.
pub const DEFAULT_EXPIRES: Duration = Duration::from_secs(60 * 60 * 24);

/// Default lifetime of a session bound to a user.
pub const DEFAULT_USER_EXPIRES: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// How long a key lives after it is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expire after the given duration.
    After(Duration),
    /// Never expire.
    Never,
}

impl Expiry {
    /// Build from a number of seconds, where `0` means never expire.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Expiry::Never
        } else {
            Expiry::After(Duration::from_secs(secs))
        }
    }

    /// The duration, if this expiry has one.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Expiry::After(d) => Some(*d),
            Expiry::Never => None,
        }
    }

    /// Reset or clear the time-to-live of `key`.
    ///
    /// A zero duration persists the key, same as [`Expiry::Never`].
    pub fn apply(&self, backend: &dyn Backend, key: &str) -> Result<()> {
        match self {
            Expiry::After(ttl) if !ttl.is_zero() => {
                trace!(key = %key, ttl_secs = ttl.as_secs(), "Setting session ttl");
                backend.set_ttl(key, *ttl)
            }
            _ => {
                trace!(key = %key, "Persisting session key");
                backend.clear_ttl(key)
            }
        }
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::After(DEFAULT_EXPIRES)
    }
}

impl From<Option<Duration>> for Expiry {
    fn from(value: Option<Duration>) -> Self {
        match value {
            Some(d) if !d.is_zero() => Expiry::After(d),
            _ => Expiry::Never,
        }
    }
}
