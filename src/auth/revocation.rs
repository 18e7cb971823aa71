//! Token Revocation Registry
//! Mission: Remember logged-out token IDs until they would have expired anyway

use crate::auth::clock::Clock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, info};

/// Denylist of token IDs revoked before their natural expiry.
///
/// Lookups take the read lock, so concurrent `is_revoked` calls never block
/// each other. `add` holds the write lock for the map insert only; expired
/// entries are dropped by `prune_expired`, normally from [`spawn_pruner`].
pub struct RevocationRegistry {
    /// token id -> natural expiry (unix seconds)
    entries: RwLock<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
}

impl RevocationRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Revoke `token_id` until `natural_expiry`. Idempotent.
    pub fn add(&self, token_id: &str, natural_expiry: i64) {
        self.entries
            .write()
            .entry(token_id.to_string())
            .and_modify(|exp| *exp = (*exp).max(natural_expiry))
            .or_insert(natural_expiry);
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.read().contains_key(token_id)
    }

    /// Drop every entry whose natural expiry has passed. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now_ts();
        let mut entries = self.entries.write();
        let before = entries.len();
        // An entry at exactly its expiry is redundant: the token already fails as expired.
        entries.retain(|_, exp| *exp > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Periodically prune the registry (runs for the life of the process).
pub fn spawn_pruner(registry: Arc<RevocationRegistry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let removed = registry.prune_expired();
            if removed > 0 {
                info!(
                    "🧹 Pruned {} expired revocation(s), {} still active",
                    removed,
                    registry.len()
                );
            } else {
                debug!(active = registry.len(), "revocation prune: nothing to remove");
            }
        }
    })
}
