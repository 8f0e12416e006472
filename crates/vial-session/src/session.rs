//! Lazily cached session backed by a single store hash.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::config::SessionOptions;
use crate::error::{Error, Result};
use crate::keys;
use crate::ttl::Expiry;

/// Field stamped once when a session is created.
pub const CREATED_FIELD: &str = "_created";

/// Field stamped every time a session is opened.
pub const ACCESSED_FIELD: &str = "_accessed";

/// Mutable mapping view of a session.
///
/// Names and values are text at this interface and bytes in the store.
/// Writes are buffered until the owning session is saved.
pub trait SessionMap {
    /// Get a field, fetching it from the store on a cache miss.
    ///
    /// Fails with [`Error::MissingField`] when the field is absent or
    /// pending deletion.
    fn get(&mut self, name: &str) -> Result<String>;

    /// Buffer a field write.
    fn set(&mut self, name: &str, value: &str);

    /// Buffer a field deletion.
    fn delete(&mut self, name: &str);

    /// Number of fields, after merging the stored hash into the cache.
    fn len(&mut self) -> Result<usize>;

    /// Field names, after merging the stored hash into the cache.
    fn keys(&mut self) -> Result<Vec<String>>;

    /// Get a field, or `None` if it is missing.
    fn get_opt(&mut self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_missing_field() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get a field, falling back to `default` if it is missing.
    fn get_or(&mut self, name: &str, default: &str) -> Result<String> {
        Ok(self
            .get_opt(name)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Whether the field can be read.
    fn contains(&mut self, name: &str) -> Result<bool> {
        Ok(self.get_opt(name)?.is_some())
    }

    /// Whether the session holds no fields.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// A cached field: either a value or a pending deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached {
    /// Value read from or written to the session.
    Present(Vec<u8>),
    /// Deleted locally, removed from the store on the next save.
    Tombstone,
}

/// A session bound to one hash in the backing store.
///
/// Reads go through an in-memory cache that is filled on demand and never
/// invalidated on its own; call [`Session::expunge`] to observe changes
/// made by someone else. Writes stay in the cache until [`Session::save`].
pub struct Session {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
    id: Option<String>,
    key: Option<String>,
    is_new: bool,
    cache: BTreeMap<Vec<u8>, Cached>,
}

impl Session {
    /// Open a session, or start a new one when `id` is `None` or unknown.
    ///
    /// An existing session has its expiration refreshed. Every opened
    /// session gets a fresh `_accessed` stamp.
    pub fn open(
        backend: Arc<dyn Backend>,
        id: Option<&str>,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self::attach(backend, id, options)?;
        let expiry = session.options.expires;
        session.finish_open(expiry)?;
        Ok(session)
    }

    /// Resolve new vs. existing and stamp `_created` for new sessions.
    pub(crate) fn attach(
        backend: Arc<dyn Backend>,
        id: Option<&str>,
        options: SessionOptions,
    ) -> Result<Self> {
        let mut session = Self {
            backend,
            options,
            id: None,
            key: None,
            is_new: true,
            cache: BTreeMap::new(),
        };

        if let Some(id) = id {
            let key = keys::session_key(session.options.namespace.as_deref(), id);
            session.is_new = !session.backend.exists(&key)?;
            session.id = Some(id.to_string());
            session.key = Some(key);
        }

        if session.is_new && !session.cache.contains_key(CREATED_FIELD.as_bytes()) {
            session.set_bytes(CREATED_FIELD.as_bytes(), now_stamp().into_bytes());
        }

        debug!(
            key = session.key.as_deref().unwrap_or("<unassigned>"),
            is_new = session.is_new,
            "Session attached"
        );

        Ok(session)
    }

    /// Refresh existing sessions with `expiry`, then stamp `_accessed`.
    pub(crate) fn finish_open(&mut self, expiry: Expiry) -> Result<()> {
        if !self.is_new {
            self.apply_expiry(expiry)?;
        }
        self.set_bytes(ACCESSED_FIELD.as_bytes(), now_stamp().into_bytes());
        Ok(())
    }

    /// Session identifier, once known.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Storage key, once the identifier is known.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether the session has not yet been persisted.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Options this session was opened with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Raw cache contents, including pending deletions.
    pub fn cached(&self) -> &BTreeMap<Vec<u8>, Cached> {
        &self.cache
    }

    /// Whether `name` has been deleted locally but not yet saved.
    pub fn is_pending_delete(&self, name: &str) -> bool {
        matches!(self.cache.get(name.as_bytes()), Some(Cached::Tombstone))
    }

    /// Clear the cache, discarding unsaved writes and deletions.
    pub fn expunge(&mut self) {
        self.cache.clear();
    }

    /// Reset or clear the session key's time-to-live.
    pub fn refresh(&self) -> Result<()> {
        self.apply_expiry(self.options.expires)
    }

    pub(crate) fn apply_expiry(&self, expiry: Expiry) -> Result<()> {
        match &self.key {
            Some(key) => expiry.apply(self.backend.as_ref(), key),
            None => {
                trace!("Session has no key yet, skipping refresh");
                Ok(())
            }
        }
    }

    /// Persist the session.
    ///
    /// New sessions first receive a freshly generated identifier. Pending
    /// deletions are removed in one call, live fields are written in a
    /// second, and the expiration is refreshed in a third. The steps are
    /// not atomic: a store failure part way leaves the record partially
    /// updated and the error is returned to the caller.
    pub fn save(&mut self) -> Result<()> {
        let expiry = self.options.expires;
        self.save_with(expiry)
    }

    pub(crate) fn save_with(&mut self, expiry: Expiry) -> Result<()> {
        let key = match self.key.clone() {
            Some(key) if !self.is_new => key,
            _ => self.assign_new_id()?,
        };

        let tombstoned: Vec<Vec<u8>> = self
            .cache
            .iter()
            .filter(|(_, v)| matches!(v, Cached::Tombstone))
            .map(|(k, _)| k.clone())
            .collect();
        if !tombstoned.is_empty() {
            self.backend.delete_fields(&key, &tombstoned)?;
            for name in &tombstoned {
                self.cache.remove(name);
            }
        }

        let live: Vec<(Vec<u8>, Vec<u8>)> = self
            .cache
            .iter()
            .filter_map(|(k, v)| match v {
                Cached::Present(value) => Some((k.clone(), value.clone())),
                Cached::Tombstone => None,
            })
            .collect();
        self.backend.set_fields(&key, &live)?;

        self.apply_expiry(expiry)?;

        debug!(
            key = %key,
            written = live.len(),
            deleted = tombstoned.len(),
            "Session saved"
        );
        Ok(())
    }

    fn assign_new_id(&mut self) -> Result<String> {
        let attempts = self.options.max_id_attempts;
        for attempt in 1..=attempts {
            let id = generate_id(self.options.key_length);
            let key = keys::session_key(self.options.namespace.as_deref(), &id);
            if !self.backend.exists(&key)? {
                trace!(attempt, "Generated session id");
                self.id = Some(id);
                self.key = Some(key.clone());
                self.is_new = false;
                return Ok(key);
            }
            debug!(attempt, "Session id collision, retrying");
        }
        Err(Error::IdExhausted { attempts })
    }

    /// Get a field's raw bytes.
    pub fn get_bytes(&mut self, name: &[u8]) -> Result<Vec<u8>> {
        match self.cache.get(name) {
            Some(Cached::Present(value)) => return Ok(value.clone()),
            Some(Cached::Tombstone) => return Err(missing(name)),
            None => {}
        }

        let Some(key) = &self.key else {
            return Err(missing(name));
        };
        match self.backend.get_field(key, name)? {
            Some(value) => {
                self.cache
                    .insert(name.to_vec(), Cached::Present(value.clone()));
                Ok(value)
            }
            None => Err(missing(name)),
        }
    }

    /// Buffer a raw field write.
    pub fn set_bytes(&mut self, name: &[u8], value: Vec<u8>) {
        self.cache.insert(name.to_vec(), Cached::Present(value));
    }

    /// Buffer a raw field deletion.
    pub fn delete_bytes(&mut self, name: &[u8]) {
        self.cache.insert(name.to_vec(), Cached::Tombstone);
    }

    /// All readable fields as text, after merging the stored hash.
    pub fn items(&mut self) -> Result<Vec<(String, String)>> {
        self.pull_all()?;
        self.cache
            .iter()
            .filter_map(|(k, v)| match v {
                Cached::Present(value) => Some((k, value)),
                Cached::Tombstone => None,
            })
            .map(|(k, v)| -> Result<(String, String)> { Ok((decode(k, k)?, decode(k, v)?)) })
            .collect()
    }

    /// Merge the stored hash into the cache without overwriting local
    /// writes or pending deletions.
    fn pull_all(&mut self) -> Result<()> {
        let Some(key) = &self.key else {
            return Ok(());
        };
        let stored = self.backend.get_all_fields(key)?;
        trace!(key = %key, fields = stored.len(), "Pulled session hash");
        for (name, value) in stored {
            self.cache.entry(name).or_insert(Cached::Present(value));
        }
        Ok(())
    }
}

impl SessionMap for Session {
    fn get(&mut self, name: &str) -> Result<String> {
        let value = self.get_bytes(name.as_bytes())?;
        decode(name.as_bytes(), &value)
    }

    fn set(&mut self, name: &str, value: &str) {
        self.set_bytes(name.as_bytes(), value.as_bytes().to_vec());
    }

    fn delete(&mut self, name: &str) {
        self.delete_bytes(name.as_bytes());
    }

    /// Pending deletions are counted until a save reconciles them.
    fn len(&mut self) -> Result<usize> {
        self.pull_all()?;
        Ok(self.cache.len())
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        self.pull_all()?;
        self.cache.keys().map(|k| decode(k, k)).collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("is_new", &self.is_new)
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn missing(name: &[u8]) -> Error {
    Error::MissingField(String::from_utf8_lossy(name).into_owned())
}

fn decode(name: &[u8], bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::InvalidUtf8(String::from_utf8_lossy(name).into_owned()))
}

fn generate_id(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(&bytes)
}

/// UNIX time in seconds with a nanosecond fraction.
fn now_stamp() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:09}", now.timestamp(), now.timestamp_subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::time::Duration;

    fn backend() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new())
    }

    fn open(backend: &Arc<MemoryBackend>, id: Option<&str>) -> Session {
        Session::open(backend.clone(), id, SessionOptions::default()).unwrap()
    }

    #[test]
    fn test_new_session_stamps() {
        let backend = backend();
        let session = open(&backend, None);

        assert!(session.is_new());
        assert_eq!(session.id(), None);
        assert_eq!(session.key(), None);
        let names: Vec<&[u8]> = session.cached().keys().map(|k| k.as_slice()).collect();
        assert_eq!(names, vec![ACCESSED_FIELD.as_bytes(), CREATED_FIELD.as_bytes()]);
        assert!(backend.is_empty());
    }

    #[test]
    fn test_unknown_id_is_new() {
        let backend = backend();
        let mut session = open(&backend, Some("never-saved"));

        assert!(session.is_new());
        assert_eq!(session.key(), Some("session:never-saved"));
        assert!(session.contains(CREATED_FIELD).unwrap());
    }

    #[test]
    fn test_save_assigns_id() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.save().unwrap();

        assert!(!session.is_new());
        let id = session.id().unwrap().to_string();
        // 256 random bytes, padded base64.
        assert_eq!(id.len(), 344);
        assert!(!id.contains(':'));
        assert!(backend.exists(session.key().unwrap()).unwrap());
    }

    #[test]
    fn test_save_of_unknown_id_generates_fresh_id() {
        let backend = backend();
        let mut session = open(&backend, Some("chosen"));
        session.save().unwrap();

        assert_ne!(session.id(), Some("chosen"));
        assert!(!backend.exists("session:chosen").unwrap());
    }

    #[test]
    fn test_reopen_keeps_created() {
        let backend = backend();
        let mut session = open(&backend, None);
        let created = session.get(CREATED_FIELD).unwrap();
        let accessed = session.get(ACCESSED_FIELD).unwrap();
        session.save().unwrap();
        let id = session.id().unwrap().to_string();

        std::thread::sleep(Duration::from_millis(2));
        let mut reopened = open(&backend, Some(&id));

        assert!(!reopened.is_new());
        assert_eq!(reopened.get(CREATED_FIELD).unwrap(), created);
        assert_ne!(reopened.get(ACCESSED_FIELD).unwrap(), accessed);
    }

    #[test]
    fn test_missing_field() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.save().unwrap();

        let result = session.get("color");
        assert!(matches!(result, Err(Error::MissingField(ref f)) if f == "color"));
        assert_eq!(session.get_or("color", "green").unwrap(), "green");
    }

    #[test]
    fn test_tombstone_reads_as_missing() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.set("color", "blue");
        session.save().unwrap();

        session.delete("color");
        assert!(session.is_pending_delete("color"));
        assert!(session.get("color").unwrap_err().is_missing_field());
        // Still counted until the deletion is saved.
        assert_eq!(session.len().unwrap(), 3);

        session.save().unwrap();
        assert!(!session.is_pending_delete("color"));
        assert_eq!(session.len().unwrap(), 2);
        let key = session.key().unwrap();
        assert_eq!(backend.get_field(key, b"color").unwrap(), None);
    }

    #[test]
    fn test_pull_all_keeps_local_writes() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.set("color", "blue");
        session.set("size", "xl");
        session.save().unwrap();
        let key = session.key().unwrap().to_string();

        backend
            .set_fields(&key, &[(b"color".to_vec(), b"red".to_vec())])
            .unwrap();
        session.set("color", "green");
        session.delete("size");

        assert_eq!(session.len().unwrap(), 4);
        let items = session.items().unwrap();
        assert!(items.contains(&("color".to_string(), "green".to_string())));
        assert!(!items.iter().any(|(k, _)| k == "size"));
    }

    #[test]
    fn test_keys_after_reopen() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.set("one", "1");
        session.save().unwrap();
        let id = session.id().unwrap().to_string();

        let mut reopened = open(&backend, Some(&id));
        let mut keys = reopened.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["_accessed", "_created", "one"]);
    }

    #[test]
    fn test_invalid_utf8_value() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.set_bytes(b"raw", vec![0xff, 0xfe]);

        assert_eq!(session.get_bytes(b"raw").unwrap(), vec![0xff, 0xfe]);
        assert!(matches!(session.get("raw"), Err(Error::InvalidUtf8(_))));
    }

    #[test]
    fn test_id_generation_exhausted() {
        let backend = backend();
        // A zero-length id always encodes to "", so its key is always taken.
        backend
            .set_fields("session:", &[(b"f".to_vec(), b"v".to_vec())])
            .unwrap();
        let options = SessionOptions::default()
            .with_key_length(0)
            .with_max_id_attempts(3);
        let mut session = Session::open(backend.clone(), None, options).unwrap();

        let result = session.save();
        assert!(matches!(result, Err(Error::IdExhausted { attempts: 3 })));
        assert!(session.is_new());
    }

    #[test]
    fn test_refresh_without_key_is_noop() {
        let backend = backend();
        let session = open(&backend, None);
        session.refresh().unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_expunge_discards_unsaved() {
        let backend = backend();
        let mut session = open(&backend, None);
        session.set("color", "blue");
        session.expunge();
        assert!(session.cached().is_empty());
        assert_eq!(session.len().unwrap(), 0);
    }
}
