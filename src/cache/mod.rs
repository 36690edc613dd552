//! In-memory TTL cache used for search results, stream variants and title
//! metadata.
//!
//! Entries are never evicted on read: an expired entry simply stops being
//! returned and is replaced by the next [`TtlCache::set`] for the same key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Keyed cache with a single time-to-live for every entry
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stored value when it is younger than the TTL
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            trace!("{} cache expired: {:?}", self.name, key);
            return None;
        }
        trace!("{} cache hit: {:?}", self.name, key);
        Some(entry.value.clone())
    }

    /// Store `value`, replacing whatever was there and restarting its TTL
    pub async fn set(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of stored entries, expired ones included
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Key for provider-scoped cache entries, e.g. `("tmdb", "find", "tt0944947")`
pub fn cache_key(provider: &str, operation: &str, argument: &str) -> String {
    format!("{provider}:{operation}:{argument}")
}
