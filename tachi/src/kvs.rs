//! Key-value store capability.
//!
//! The gateway keeps its only mutable shared state in a KVS: consumed
//! transaction hashes (`tx:<hash>`, TTL 24 h) and per-IP rate counters
//! (`rate:<ip>:<window>`, TTL 120 s). The trait is deliberately small so a
//! Redis-backed store and the in-process [`MemoryKvs`] are interchangeable.
//!
//! [`Kvs::put_if_absent`] must be atomic: when concurrent requests race on
//! the same key, exactly one caller observes the insert. Counters only need
//! best-effort accuracy.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Errors surfaced by a KVS backend.
#[derive(Debug, thiserror::Error)]
pub enum KvsError {
    /// The backend could not be reached or returned a protocol error.
    #[error("kvs backend error: {0}")]
    Backend(String),
}

/// Minimal key-value store with per-key TTL.
#[async_trait]
pub trait Kvs: Send + Sync {
    /// Reads a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, KvsError>;

    /// Inserts `value` under `key` only if the key is absent (or expired).
    ///
    /// Returns `true` if this call performed the insert. Concurrent callers
    /// racing on one key see exactly one `true`.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvsError>;

    /// Atomically increments a counter, creating it with the given TTL.
    ///
    /// Returns the post-increment value. The TTL is set when the counter is
    /// created and left untouched afterwards, so a window's counter expires
    /// relative to its first hit.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvsError>;

    /// Backend reachability probe for health reporting.
    async fn ping(&self) -> Result<(), KvsError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process [`Kvs`] over a concurrent map.
///
/// Entries expire lazily: an expired entry is treated as absent and replaced
/// on the next write to its key. Suitable for single-instance deployments and
/// tests; multi-instance deployments want the Redis backend so replay
/// protection spans instances.
#[derive(Debug, Default)]
pub struct MemoryKvs {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryKvs {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Kvs for MemoryKvs {
    async fn get(&self, key: &str) -> Result<Option<String>, KvsError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.fresh(now))
            .map(|entry| entry.value.clone()))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvsError> {
        let now = Instant::now();
        let entry = MemoryEntry {
            value: value.to_owned(),
            expires_at: now + ttl,
        };
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().fresh(now) {
                    Ok(false)
                } else {
                    occupied.insert(entry);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, KvsError> {
        let now = Instant::now();
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().fresh(now) {
                    let count = occupied
                        .get()
                        .value
                        .parse::<u64>()
                        .map_err(|_| KvsError::Backend(format!("non-numeric counter at {key}")))?
                        .saturating_add(1);
                    occupied.get_mut().value = count.to_string();
                    Ok(count)
                } else {
                    occupied.insert(MemoryEntry {
                        value: "1".to_owned(),
                        expires_at: now + ttl,
                    });
                    Ok(1)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(MemoryEntry {
                    value: "1".to_owned(),
                    expires_at: now + ttl,
                });
                Ok(1)
            }
        }
    }

    async fn ping(&self) -> Result<(), KvsError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_if_absent_inserts_once() {
        let kvs = MemoryKvs::new();
        let ttl = Duration::from_secs(60);
        assert!(kvs.put_if_absent("tx:0xabc", "1", ttl).await.unwrap());
        assert!(!kvs.put_if_absent("tx:0xabc", "2", ttl).await.unwrap());
        assert_eq!(kvs.get("tx:0xabc").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let kvs = MemoryKvs::new();
        let ttl = Duration::from_millis(10);
        assert!(kvs.put_if_absent("k", "v", ttl).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kvs.get("k").await.unwrap(), None);
        assert!(kvs.put_if_absent("k", "v2", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_incr_counts_within_window() {
        let kvs = MemoryKvs::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(kvs.incr("rate:ip:1", ttl).await.unwrap(), 1);
        assert_eq!(kvs.incr("rate:ip:1", ttl).await.unwrap(), 2);
        assert_eq!(kvs.incr("rate:ip:2", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_restarts_after_expiry() {
        let kvs = MemoryKvs::new();
        let ttl = Duration::from_millis(10);
        assert_eq!(kvs.incr("rate:ip:1", ttl).await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kvs.incr("rate:ip:1", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_put_if_absent_single_winner() {
        use std::sync::Arc;

        let kvs = Arc::new(MemoryKvs::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let kvs = Arc::clone(&kvs);
            tasks.push(tokio::spawn(async move {
                kvs.put_if_absent("tx:0xshared", "ts", Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
