//! Store facade handing out sessions over a shared backend.

use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
#[cfg(feature = "redis")]
use crate::config::StoreConfig;
use crate::config::SessionOptions;
use crate::error::Result;
use crate::keys;
use crate::session::Session;
use crate::user::UserSession;

/// Factory for [`Session`] and [`UserSession`] values.
///
/// Every session it opens shares the store's backend and default options.
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
}

impl SessionStore {
    /// Create a store with default options and the given namespace.
    pub fn new(backend: Arc<dyn Backend>, namespace: Option<String>) -> Self {
        let options = SessionOptions {
            namespace,
            ..SessionOptions::default()
        };
        Self::with_options(backend, options)
    }

    /// Create a store with explicit default options.
    pub fn with_options(backend: Arc<dyn Backend>, options: SessionOptions) -> Self {
        Self { backend, options }
    }

    /// Connect to Redis as described by `config`.
    #[cfg(feature = "redis")]
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let backend = crate::redis_backend::RedisBackend::open(&config.redis_url())?;
        Ok(Self::with_options(
            Arc::new(backend),
            config.session_options(),
        ))
    }

    /// The shared backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Default options injected into opened sessions.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Open a session with the store defaults.
    pub fn session(&self, id: Option<&str>) -> Result<Session> {
        Session::open(self.backend.clone(), id, self.options.clone())
    }

    /// Open a session with custom options.
    ///
    /// The store namespace is used unless `options` names its own.
    pub fn session_with(&self, id: Option<&str>, options: SessionOptions) -> Result<Session> {
        Session::open(self.backend.clone(), id, self.inject(options))
    }

    /// Open a user session with the store defaults.
    pub fn user_session(&self, id: Option<&str>, user: Option<&str>) -> Result<UserSession> {
        UserSession::open(self.backend.clone(), id, user, self.options.clone())
    }

    /// Open a user session with custom options.
    pub fn user_session_with(
        &self,
        id: Option<&str>,
        user: Option<&str>,
        options: SessionOptions,
    ) -> Result<UserSession> {
        UserSession::open(self.backend.clone(), id, user, self.inject(options))
    }

    /// Identifiers of every session bound to `user`.
    ///
    /// The set is read once; the iterator walks that snapshot.
    pub fn get_for_user(&self, user: &str) -> Result<UserSessionIds> {
        let user_key = keys::user_key(self.options.namespace.as_deref(), user);
        let members = self.backend.set_members(&user_key)?;
        debug!(user_key = %user_key, count = members.len(), "Listed user sessions");
        Ok(UserSessionIds {
            members: members.into_iter(),
        })
    }

    /// Delete every session bound to `user`, then the user's set itself.
    ///
    /// Returns the number of session keys that were listed for deletion.
    pub fn delete_for_user(&self, user: &str) -> Result<usize> {
        let user_key = keys::user_key(self.options.namespace.as_deref(), user);
        let session_keys: Vec<String> = self
            .backend
            .set_members(&user_key)?
            .iter()
            .map(|m| String::from_utf8_lossy(m).into_owned())
            .collect();

        if !session_keys.is_empty() {
            self.backend.delete_keys(&session_keys)?;
        }
        self.backend.delete_keys(&[user_key.clone()])?;

        debug!(user_key = %user_key, deleted = session_keys.len(), "Deleted user sessions");
        Ok(session_keys.len())
    }

    fn inject(&self, mut options: SessionOptions) -> SessionOptions {
        if options.namespace.is_none() {
            options.namespace = self.options.namespace.clone();
        }
        options
    }
}

/// Session identifiers taken from a user's session set.
#[derive(Debug)]
pub struct UserSessionIds {
    members: std::vec::IntoIter<Vec<u8>>,
}

impl Iterator for UserSessionIds {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.members.next().map(|member| {
            let key = String::from_utf8_lossy(&member);
            keys::id_from_key(&key).to_string()
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.members.size_hint()
    }
}

impl ExactSizeIterator for UserSessionIds {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::session::SessionMap;

    fn store(namespace: Option<&str>) -> SessionStore {
        SessionStore::new(
            Arc::new(MemoryBackend::new()),
            namespace.map(str::to_string),
        )
    }

    #[test]
    fn test_store_injects_namespace() {
        let store = store(Some("app"));
        let mut session = store.session(None).unwrap();
        session.save().unwrap();
        assert!(session.key().unwrap().starts_with("app:session:"));
    }

    #[test]
    fn test_session_with_overrides_namespace() {
        let store = store(Some("app"));
        let options = SessionOptions::default().with_namespace("other");
        let mut session = store.session_with(None, options).unwrap();
        session.save().unwrap();
        assert!(session.key().unwrap().starts_with("other:session:"));
    }

    #[test]
    fn test_get_for_unknown_user_is_empty() {
        let store = store(None);
        assert_eq!(store.get_for_user("nobody").unwrap().count(), 0);
    }

    #[test]
    fn test_delete_for_user_without_sessions() {
        let store = store(None);
        assert_eq!(store.delete_for_user("nobody").unwrap(), 0);
    }

    #[test]
    fn test_get_for_user_with_namespace() {
        let store = store(Some("app"));
        let mut session = store.user_session(None, Some("42")).unwrap();
        session.set("theme", "dark");
        session.save().unwrap();

        let ids: Vec<String> = store.get_for_user("42").unwrap().collect();
        assert_eq!(ids, vec![session.id().unwrap().to_string()]);
        assert!(store.backend().exists("app:user:42").unwrap());
    }
}
