//! Replay protection for payment proofs.
//!
//! A transaction hash authorizes at most one protected response, ever.
//! Consumption is a conditional KVS insert of `tx:<hash>`: of any number of
//! concurrent requests presenting the same hash, exactly one observes the
//! insert and proceeds; the rest are replays. The entry's value is the
//! consumption timestamp and it expires after 24 h.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tachi::kvs::KvsError;
use tachi::{Kvs, TxHash};

/// How long a consumed hash stays blocked.
pub const REPLAY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Guards consumed transaction hashes in the shared KVS.
#[derive(Clone)]
pub struct ReplayGuard {
    kvs: Arc<dyn Kvs>,
}

impl std::fmt::Debug for ReplayGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayGuard").finish_non_exhaustive()
    }
}

impl ReplayGuard {
    /// Creates a guard over the given store.
    #[must_use]
    pub fn new(kvs: Arc<dyn Kvs>) -> Self {
        Self { kvs }
    }

    /// Cheap pre-check before any RPC work: has this hash been used?
    ///
    /// # Errors
    ///
    /// Propagates KVS errors; the caller surfaces them as upstream
    /// unavailability rather than silently skipping replay protection.
    pub async fn is_consumed(&self, tx_hash: &TxHash) -> Result<bool, KvsError> {
        Ok(self.kvs.get(&tx_hash.kvs_key()).await?.is_some())
    }

    /// Atomically consumes the hash. Returns `true` if this call won the
    /// insert; `false` means another request already spent it.
    ///
    /// # Errors
    ///
    /// Propagates KVS errors. The guard never fails open: without a
    /// successful insert no 2xx may be written.
    pub async fn consume(&self, tx_hash: &TxHash) -> Result<bool, KvsError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        self.kvs
            .put_if_absent(&tx_hash.kvs_key(), &timestamp, REPLAY_TTL)
            .await
    }
}
