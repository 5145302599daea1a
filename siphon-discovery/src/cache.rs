//! TTL cache for per-domain discovery aggregates.

use crate::types::DomainDiscovery;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Per-domain aggregate cache with a fixed TTL.
pub struct DiscoveryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (DomainDiscovery, Instant)>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a live entry; expired entries are dropped on read.
    pub async fn get(&self, domain: &str) -> Option<DomainDiscovery> {
        {
            let entries = self.entries.read().await;
            if let Some((discovery, inserted_at)) = entries.get(domain) {
                if inserted_at.elapsed() < self.ttl {
                    return Some(discovery.clone());
                }
            } else {
                return None;
            }
        }

        // Entry exists but expired
        self.entries.write().await.remove(domain);
        None
    }

    /// Store an aggregate.
    pub async fn put(&self, domain: &str, discovery: DomainDiscovery) {
        self.entries
            .write()
            .await
            .insert(domain.to_string(), (discovery, Instant::now()));
    }

    /// Drop one domain's entry.
    pub async fn invalidate(&self, domain: &str) {
        self.entries.write().await.remove(domain);
    }

    /// Number of cached domains (including not-yet-swept expired ones).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
