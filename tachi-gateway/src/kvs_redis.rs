//! Redis-backed KVS.
//!
//! The production store: replay protection must span gateway instances, so
//! consumed hashes and rate counters live in a shared Redis. Atomic insert
//! maps to `SET NX EX`; counters to `INCR` with an `EXPIRE` on first touch.
//! The connection manager reconnects on its own; individual command
//! failures surface as [`KvsError`] and the callers decide their policy
//! (rate limiting fails open, replay protection does not).

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tachi::kvs::{Kvs, KvsError};

/// [`Kvs`] over a shared Redis instance.
#[derive(Clone)]
pub struct RedisKvs {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisKvs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvs").finish_non_exhaustive()
    }
}

impl RedisKvs {
    /// Connects to Redis and starts the reconnecting manager.
    ///
    /// # Errors
    ///
    /// [`KvsError::Backend`] when the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self, KvsError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let manager = client.get_connection_manager().await.map_err(backend)?;
        Ok(Self { manager })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl Kvs for RedisKvs {
    async fn get(&self, key: &str) -> Result<Option<String>, KvsError> {
        let mut conn = self.connection();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvsError> {
        let mut conn = self.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvsError> {
        let mut conn = self.connection();
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
        }
        Ok(count)
    }

    async fn ping(&self) -> Result<(), KvsError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

fn backend(error: redis::RedisError) -> KvsError {
    KvsError::Backend(error.to_string())
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
