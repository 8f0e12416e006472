//! Redis implementation of [`Backend`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use redis::Commands;
use tracing::debug;

use crate::backend::{Backend, FieldPairs};
use crate::error::Result;

/// Backend that issues one Redis command per capability.
///
/// The connection is shared behind a mutex; every call holds it only for
/// the duration of a single command.
pub struct RedisBackend {
    conn: Mutex<redis::Connection>,
}

impl RedisBackend {
    /// Connect to `redis://host:port/db`.
    pub fn connect(host: &str, port: u16, db: i64) -> Result<Self> {
        Self::open(&format!("redis://{host}:{port}/{db}"))
    }

    /// Connect using a full Redis URL.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        debug!(url = %url, "Connected to Redis");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap an already established connection.
    pub fn from_connection(conn: redis::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl Backend for RedisBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.conn.lock().exists(key)?)
    }

    fn get_field(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.conn.lock().hget(key, field)?)
    }

    fn get_all_fields(&self, key: &str) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        Ok(self.conn.lock().hgetall(key)?)
    }

    fn set_fields(&self, key: &str, fields: &FieldPairs) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.conn.lock().hset_multiple(key, fields)?;
        Ok(())
    }

    fn delete_fields(&self, key: &str, fields: &[Vec<u8>]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _: () = self.conn.lock().hdel(key, fields)?;
        Ok(())
    }

    fn delete_keys(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let _: () = self.conn.lock().del(keys)?;
        Ok(())
    }

    fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let _: () = self.conn.lock().pexpire(key, millis)?;
        Ok(())
    }

    fn clear_ttl(&self, key: &str) -> Result<()> {
        let _: () = self.conn.lock().persist(key)?;
        Ok(())
    }

    fn set_add(&self, key: &str, members: &[Vec<u8>]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let _: () = self.conn.lock().sadd(key, members)?;
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &[u8]) -> Result<()> {
        let _: () = self.conn.lock().srem(key, member)?;
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self.conn.lock().smembers(key)?)
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        // PTTL answers -2 for a missing key and -1 for no expiration.
        let millis: i64 = self.conn.lock().pttl(key)?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }
}
