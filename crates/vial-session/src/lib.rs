//! Server-side sessions kept in a key-value store.
//!
//! This crate provides:
//! - [`Session`]: a lazily cached bag of text fields stored as one hash,
//!   with buffered writes, deletions and expiration
//! - [`UserSession`]: a session that can be bound to an application user
//!   and listed under that user
//! - [`SessionStore`]: a facade injecting the shared backend and
//!   namespace, plus bulk per-user queries
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vial_session::{MemoryBackend, SessionMap, SessionStore};
//!
//! let store = SessionStore::new(Arc::new(MemoryBackend::new()), None);
//!
//! let mut session = store.user_session(None, Some("12345"))?;
//! session.set("theme", "dark");
//! session.save()?;
//!
//! let ids: Vec<String> = store.get_for_user("12345")?.collect();
//! ```

mod backend;
mod config;
mod error;
pub mod keys;
#[cfg(feature = "redis")]
mod redis_backend;
mod session;
mod store;
mod ttl;
mod user;

pub use backend::{Backend, FieldPairs, MemoryBackend};
pub use config::{
    DEFAULT_KEY_LENGTH, DEFAULT_MAX_ID_ATTEMPTS, SessionOptions, StoreConfig, load_config_file,
};
pub use error::{Error, Result};
#[cfg(feature = "redis")]
pub use redis_backend::RedisBackend;
pub use session::{ACCESSED_FIELD, CREATED_FIELD, Cached, Session, SessionMap};
pub use store::{SessionStore, UserSessionIds};
pub use ttl::{DEFAULT_EXPIRES, DEFAULT_USER_EXPIRES, Expiry};
pub use user::{USER_FIELD, UserSession};
