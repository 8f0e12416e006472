//! Sessions bound to an application user.
//!
//! A bound session stores the user identifier in its `_user_id` field and
//! is listed in the store set `[<namespace>:]user:<user>`, which lets the
//! store enumerate or drop every session a user holds. Bound sessions use
//! the `user_expires` lifetime instead of `expires`.

use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::config::SessionOptions;
use crate::error::Result;
use crate::keys;
use crate::session::{Session, SessionMap};
use crate::ttl::Expiry;

/// Field holding the bound user identifier.
pub const USER_FIELD: &str = "_user_id";

/// A [`Session`] that may be bound to a user.
#[derive(Debug)]
pub struct UserSession {
    session: Session,
    user_key: Option<String>,
}

impl UserSession {
    /// Open a user session, binding it to `user` when given.
    ///
    /// New-vs-existing is resolved before the binding is applied, so
    /// rebinding an existing session moves it out of its previous user's
    /// set.
    pub fn open(
        backend: Arc<dyn Backend>,
        id: Option<&str>,
        user: Option<&str>,
        options: SessionOptions,
    ) -> Result<Self> {
        let session = Session::attach(backend, id, options)?;
        let mut this = Self {
            session,
            user_key: None,
        };

        let expiry = this.effective_expiry()?;
        this.session.finish_open(expiry)?;

        if let Some(user) = user {
            this.set_user(user)?;
        }
        Ok(this)
    }

    /// The bound user, or `None` for an unbound session.
    pub fn user(&mut self) -> Result<Option<String>> {
        self.session.get_opt(USER_FIELD)
    }

    /// Bind the session to `user`.
    ///
    /// A persisted session is removed from its previous user's set right
    /// away. The new binding reaches the store only on [`UserSession::save`].
    pub fn set_user(&mut self, user: &str) -> Result<()> {
        let previous = self.user()?;
        let namespace = self.session.options().namespace.clone();

        if !self.session.is_new()
            && let Some(old) = previous.filter(|u| !u.is_empty())
            && let Some(key) = self.session.key()
        {
            let old_key = keys::user_key(namespace.as_deref(), &old);
            debug!(session = %key, from = %old, to = %user, "Rebinding session user");
            self.session.backend().set_remove(&old_key, key.as_bytes())?;
        }

        self.user_key = Some(keys::user_key(namespace.as_deref(), user));
        self.session.set(USER_FIELD, user);
        Ok(())
    }

    /// Key of the bound user's session set, once a user has been assigned.
    pub fn user_key(&self) -> Option<&str> {
        self.user_key.as_deref()
    }

    /// Persist the session, then list it in the bound user's set.
    pub fn save(&mut self) -> Result<()> {
        let expiry = self.effective_expiry()?;
        self.session.save_with(expiry)?;

        if let (Some(user_key), Some(key)) = (&self.user_key, self.session.key()) {
            self.session
                .backend()
                .set_add(user_key, &[key.as_bytes().to_vec()])?;
            debug!(session = %key, user_key = %user_key, "Session added to user set");
        }
        Ok(())
    }

    /// Reset or clear the time-to-live, using the user lifetime when bound.
    pub fn refresh(&mut self) -> Result<()> {
        let expiry = self.effective_expiry()?;
        self.session.apply_expiry(expiry)
    }

    fn effective_expiry(&mut self) -> Result<Expiry> {
        let bound = self.user()?.is_some();
        let options = self.session.options();
        Ok(if bound {
            options.user_expires
        } else {
            options.expires
        })
    }

    /// Session identifier, once known.
    pub fn id(&self) -> Option<&str> {
        self.session.id()
    }

    /// Storage key, once the identifier is known.
    pub fn key(&self) -> Option<&str> {
        self.session.key()
    }

    /// Whether the session has not yet been persisted.
    pub fn is_new(&self) -> bool {
        self.session.is_new()
    }

    /// Clear the cache, discarding unsaved writes and deletions.
    pub fn expunge(&mut self) {
        self.session.expunge();
    }

    /// Borrow the underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Unwrap into the underlying session.
    pub fn into_session(self) -> Session {
        self.session
    }
}

impl SessionMap for UserSession {
    fn get(&mut self, name: &str) -> Result<String> {
        self.session.get(name)
    }

    fn set(&mut self, name: &str, value: &str) {
        self.session.set(name, value);
    }

    fn delete(&mut self, name: &str) {
        self.session.delete(name);
    }

    fn len(&mut self) -> Result<usize> {
        self.session.len()
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        self.session.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::time::Duration;

    fn options() -> SessionOptions {
        SessionOptions::default()
            .with_expires(Expiry::After(Duration::from_secs(60)))
            .with_user_expires(Expiry::After(Duration::from_secs(3600)))
    }

    #[test]
    fn test_unbound_user_is_none() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session = UserSession::open(backend, None, None, options()).unwrap();
        assert_eq!(session.user().unwrap(), None);
        assert_eq!(session.user_key(), None);
    }

    #[test]
    fn test_set_user_defers_set_write() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session = UserSession::open(backend.clone(), None, None, options()).unwrap();
        session.set_user("12345").unwrap();

        assert_eq!(session.user().unwrap().as_deref(), Some("12345"));
        assert_eq!(session.user_key(), Some("user:12345"));
        assert!(!backend.exists("user:12345").unwrap());

        session.save().unwrap();
        let members = backend.set_members("user:12345").unwrap();
        assert_eq!(members, vec![session.key().unwrap().as_bytes().to_vec()]);
    }

    #[test]
    fn test_bound_session_uses_user_expiry() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session =
            UserSession::open(backend.clone(), None, Some("12345"), options()).unwrap();
        session.save().unwrap();

        let ttl = backend.ttl(session.key().unwrap()).unwrap().unwrap();
        assert!(ttl > Duration::from_secs(60));
        assert!(ttl <= Duration::from_secs(3600));
    }

    #[test]
    fn test_reopen_bound_session_refreshes_with_user_expiry() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session =
            UserSession::open(backend.clone(), None, Some("12345"), options()).unwrap();
        session.save().unwrap();
        let id = session.id().unwrap().to_string();
        let key = session.key().unwrap().to_string();

        backend.set_ttl(&key, Duration::from_secs(5)).unwrap();
        let mut reopened = UserSession::open(backend.clone(), Some(&id), None, options()).unwrap();

        assert_eq!(reopened.user().unwrap().as_deref(), Some("12345"));
        let ttl = backend.ttl(&key).unwrap().unwrap();
        assert!(ttl > Duration::from_secs(60));
    }

    #[test]
    fn test_unsaved_rebind_leaves_new_set_untouched() {
        let backend = Arc::new(MemoryBackend::new());
        let mut session =
            UserSession::open(backend.clone(), None, Some("alice"), options()).unwrap();
        session.save().unwrap();
        let id = session.id().unwrap().to_string();

        let _rebound =
            UserSession::open(backend.clone(), Some(&id), Some("bob"), options()).unwrap();

        assert!(backend.set_members("user:alice").unwrap().is_empty());
        assert!(backend.set_members("user:bob").unwrap().is_empty());
    }
}
