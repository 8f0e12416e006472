//! Backing store capability trait.
//!
//! Sessions never talk to a concrete client directly. Everything they need
//! from the key-value store is expressed by [`Backend`], so the same
//! session logic runs against Redis in production and against
//! [`MemoryBackend`] in tests or single-process deployments.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vial_session::{Backend, MemoryBackend, SessionStore};
//!
//! let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
//! let store = SessionStore::new(backend, Some("app".to_string()));
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Field name/value pairs written in one call.
pub type FieldPairs = [(Vec<u8>, Vec<u8>)];

/// Operations a session needs from the key-value store.
///
/// Each method maps onto a single store command and is expected to be
/// atomic on its own. Nothing here is transactional across calls.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one connection can be shared by
/// every session a [`crate::SessionStore`] hands out.
pub trait Backend: Send + Sync {
    /// Check whether a key exists.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch a single hash field. Returns `Ok(None)` when absent.
    fn get_field(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Fetch every field of a hash. A missing key yields an empty map.
    fn get_all_fields(&self, key: &str) -> Result<HashMap<Vec<u8>, Vec<u8>>>;

    /// Write several hash fields. Fields not mentioned are left untouched.
    fn set_fields(&self, key: &str, fields: &FieldPairs) -> Result<()>;

    /// Remove several hash fields.
    fn delete_fields(&self, key: &str, fields: &[Vec<u8>]) -> Result<()>;

    /// Remove whole keys.
    fn delete_keys(&self, keys: &[String]) -> Result<()>;

    /// Set or extend the time-to-live of a key.
    fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Make a key never expire.
    fn clear_ttl(&self, key: &str) -> Result<()>;

    /// Add members to a set.
    fn set_add(&self, key: &str, members: &[Vec<u8>]) -> Result<()>;

    /// Remove a member from a set.
    fn set_remove(&self, key: &str, member: &[u8]) -> Result<()>;

    /// Snapshot of a set's members. A missing key yields an empty list.
    fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    /// Remaining time-to-live of a key.
    ///
    /// Returns `Ok(None)` when the key is missing or has no expiration.
    fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }
}

fn wrong_type(key: &str) -> Error {
    Error::Backend(format!(
        "WRONGTYPE operation against key '{key}' holding the wrong kind of value"
    ))
}

/// In-process backend with Redis-like semantics.
///
/// Hashes and sets are kept in one keyspace, emptied values disappear and
/// expired keys are purged the next time they are touched.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Check if there are no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` on the live entry for `key`, purging it first if it expired
    /// and dropping it afterwards if `f` left it empty.
    fn with_entry<R>(
        &self,
        key: &str,
        f: impl FnOnce(Option<&mut Entry>) -> Result<R>,
    ) -> Result<R> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        let result = f(entries.get_mut(key));
        if entries.get(key).is_some_and(|e| e.value.is_empty()) {
            entries.remove(key);
        }
        result
    }

    fn with_hash_or_insert<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<Vec<u8>, Vec<u8>>) -> R,
    ) -> Result<R> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            deadline: None,
        });
        let result = match &mut entry.value {
            Value::Hash(h) => Ok(f(h)),
            Value::Set(_) => Err(wrong_type(key)),
        };
        if entry.value.is_empty() {
            entries.remove(key);
        }
        result
    }

    fn with_set_or_insert<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashSet<Vec<u8>>) -> R,
    ) -> Result<R> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            deadline: None,
        });
        let result = match &mut entry.value {
            Value::Set(s) => Ok(f(s)),
            Value::Hash(_) => Err(wrong_type(key)),
        };
        if entry.value.is_empty() {
            entries.remove(key);
        }
        result
    }
}

impl Backend for MemoryBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        self.with_entry(key, |entry| Ok(entry.is_some()))
    }

    fn get_field(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(h.get(field).cloned()),
            Some(Value::Set(_)) => Err(wrong_type(key)),
        })
    }

    fn get_all_fields(&self, key: &str) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(Value::Set(_)) => Err(wrong_type(key)),
        })
    }

    fn set_fields(&self, key: &str, fields: &FieldPairs) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.with_hash_or_insert(key, |h| {
            for (name, value) in fields {
                h.insert(name.clone(), value.clone());
            }
        })
    }

    fn delete_fields(&self, key: &str, fields: &[Vec<u8>]) -> Result<()> {
        self.with_entry(key, |entry| match entry.map(|e| &mut e.value) {
            None => Ok(()),
            Some(Value::Hash(h)) => {
                for name in fields {
                    h.remove(name);
                }
                Ok(())
            }
            Some(Value::Set(_)) => Err(wrong_type(key)),
        })
    }

    fn delete_keys(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        self.with_entry(key, |entry| {
            if let Some(entry) = entry {
                entry.deadline = Some(Instant::now() + ttl);
            }
            Ok(())
        })
    }

    fn clear_ttl(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| {
            if let Some(entry) = entry {
                entry.deadline = None;
            }
            Ok(())
        })
    }

    fn set_add(&self, key: &str, members: &[Vec<u8>]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.with_set_or_insert(key, |s| {
            s.extend(members.iter().cloned());
        })
    }

    fn set_remove(&self, key: &str, member: &[u8]) -> Result<()> {
        self.with_entry(key, |entry| match entry.map(|e| &mut e.value) {
            None => Ok(()),
            Some(Value::Set(s)) => {
                s.remove(member);
                Ok(())
            }
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        })
    }

    fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        })
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.with_entry(key, |entry| {
            Ok(entry
                .and_then(|e| e.deadline)
                .map(|d| d.saturating_duration_since(Instant::now())))
        })
    }
}
