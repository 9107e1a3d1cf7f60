//! Generic dual-tier cache
//!
//! Lookups check the optional in-memory tier first, then the durable store;
//! a durable hit back-fills memory. Writes go to both tiers. Expiration
//! applies only to the memory tier: entries age out on a sliding window
//! since last access and an absolute window since insertion. The durable
//! tier is authoritative and never evicted.
//!
//! Failures never poison the cache: durable errors and deserialization
//! errors are logged and surfaced as a miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use super::store::DurableStore;

/// Sliding expiration for the memory tier.
const SLIDING_TTL: Duration = Duration::from_secs(60 * 60);
/// Absolute expiration for the memory tier.
const ABSOLUTE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct MemoryEntry<V> {
    value: V,
    inserted_at: Instant,
    last_access: Instant,
}

impl<V> MemoryEntry<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        MemoryEntry {
            value,
            inserted_at: now,
            last_access: now,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.last_access) < SLIDING_TTL
            && now.duration_since(self.inserted_at) < ABSOLUTE_TTL
    }
}

/// Process-wide cache keyed by `(name, version_key)`, generic over the
/// cached value type.
pub struct TieredCache<V> {
    /// Logical cache name, used in log lines only.
    label: &'static str,
    memory: Option<RwLock<HashMap<(String, String), MemoryEntry<V>>>>,
    store: Arc<dyn DurableStore>,
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(label: &'static str, store: Arc<dyn DurableStore>, memory_enabled: bool) -> Self {
        TieredCache {
            label,
            memory: memory_enabled.then(|| RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Look up an entry. Memory first, then durable with memory back-fill.
    /// Every failure path is a miss.
    pub async fn get(&self, name: &str, version_key: &str) -> Option<V> {
        let key = (name.to_string(), version_key.to_string());

        if let Some(memory) = &self.memory {
            let now = Instant::now();
            let hit = {
                let map = memory.read().await;
                map.get(&key)
                    .filter(|entry| entry.is_fresh(now))
                    .map(|entry| entry.value.clone())
            };
            if let Some(value) = hit {
                let mut map = memory.write().await;
                if let Some(entry) = map.get_mut(&key) {
                    entry.last_access = now;
                }
                log::trace!("{} cache hit (memory): {}@{}", self.label, name, version_key);
                return Some(value);
            }
        }

        let payload = match self.store.fetch(name, version_key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("{} cache: durable read failed for {}@{}: {}", self.label, name, version_key, err);
                return None;
            }
        };

        let value: V = match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{} cache: corrupt durable entry for {}@{}: {}", self.label, name, version_key, err);
                return None;
            }
        };

        if let Some(memory) = &self.memory {
            let mut map = memory.write().await;
            map.insert(key, MemoryEntry::new(value.clone()));
        }

        log::trace!("{} cache hit (durable): {}@{}", self.label, name, version_key);
        Some(value)
    }

    /// Write an entry to both tiers.
    pub async fn put(&self, name: &str, version_key: &str, value: &V) {
        if let Some(memory) = &self.memory {
            let mut map = memory.write().await;
            map.insert(
                (name.to_string(), version_key.to_string()),
                MemoryEntry::new(value.clone()),
            );
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("{} cache: failed to serialize {}@{}: {}", self.label, name, version_key, err);
                return;
            }
        };

        if let Err(err) = self.store.upsert(name, version_key, &payload).await {
            log::warn!("{} cache: durable write failed for {}@{}: {}", self.label, name, version_key, err);
        }
    }

    /// Rehydrate the memory tier from the durable store. No-op when the
    /// memory tier is disabled. Corrupt rows are skipped.
    pub async fn load_all(&self) {
        let Some(memory) = &self.memory else { return };

        let entries = match self.store.load_all().await {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("{} cache: load_all failed: {}", self.label, err);
                return;
            }
        };

        let mut map = memory.write().await;
        let mut loaded = 0usize;
        for (name, version_key, payload) in entries {
            match serde_json::from_str::<V>(&payload) {
                Ok(value) => {
                    map.insert((name, version_key), MemoryEntry::new(value));
                    loaded += 1;
                }
                Err(err) => {
                    log::warn!("{} cache: skipping corrupt row {}@{}: {}", self.label, name, version_key, err);
                }
            }
        }
        log::debug!("{} cache: rehydrated {} entries", self.label, loaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteStore;

    fn cache(memory: bool) -> TieredCache<Vec<String>> {
        let store = Arc::new(SqliteStore::open_in_memory("test_cache").unwrap());
        TieredCache::new("test", store, memory)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let cache = cache(true);
        let value = vec!["1.0.0".to_string(), "2.0.0".to_string()];

        cache.put("pkg", "*", &value).await;
        assert_eq!(cache.get("pkg", "*").await, Some(value));
    }

    #[tokio::test]
    async fn test_miss() {
        let cache = cache(true);
        assert_eq!(cache.get("pkg", "*").await, None);
    }

    #[tokio::test]
    async fn test_memory_disabled_passes_through() {
        let cache = cache(false);
        let value = vec!["1.0.0".to_string()];

        cache.put("pkg", "^1.0.0", &value).await;
        assert_eq!(cache.get("pkg", "^1.0.0").await, Some(value));
    }

    #[tokio::test]
    async fn test_durable_backfills_memory() {
        let store = Arc::new(SqliteStore::open_in_memory("test_cache").unwrap());
        let writer: TieredCache<Vec<String>> = TieredCache::new("w", store.clone(), false);
        let reader: TieredCache<Vec<String>> = TieredCache::new("r", store, true);

        let value = vec!["3.1.4".to_string()];
        writer.put("pkg", "*", &value).await;

        // First read comes from durable and back-fills memory; the second
        // is served from memory.
        assert_eq!(reader.get("pkg", "*").await, Some(value.clone()));
        assert_eq!(reader.get("pkg", "*").await, Some(value));
    }

    #[tokio::test]
    async fn test_corrupt_durable_entry_is_a_miss() {
        let store = Arc::new(SqliteStore::open_in_memory("test_cache").unwrap());
        store.upsert("pkg", "*", "not json").await.unwrap();

        let cache: TieredCache<Vec<String>> = TieredCache::new("test", store, true);
        assert_eq!(cache.get("pkg", "*").await, None);
    }

    #[tokio::test]
    async fn test_load_all_rehydrates() {
        let store = Arc::new(SqliteStore::open_in_memory("test_cache").unwrap());
        let writer: TieredCache<Vec<String>> = TieredCache::new("w", store.clone(), false);
        writer.put("a", "*", &vec!["1.0.0".to_string()]).await;
        writer.put("b", "*", &vec!["2.0.0".to_string()]).await;

        let reader: TieredCache<Vec<String>> = TieredCache::new("r", store, true);
        reader.load_all().await;

        assert_eq!(reader.get("a", "*").await, Some(vec!["1.0.0".to_string()]));
        assert_eq!(reader.get("b", "*").await, Some(vec!["2.0.0".to_string()]));
    }

    #[tokio::test]
    async fn test_tags_are_independent() {
        let cache = cache(true);
        cache.put("pkg", "*", &vec!["all".to_string()]).await;
        cache.put("pkg", "^1.2.0", &vec!["tagged".to_string()]).await;

        assert_eq!(cache.get("pkg", "*").await, Some(vec!["all".to_string()]));
        assert_eq!(cache.get("pkg", "^1.2.0").await, Some(vec!["tagged".to_string()]));
    }
}
