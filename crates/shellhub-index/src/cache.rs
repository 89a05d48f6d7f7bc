//! In-memory cache of materialized document content.
//!
//! Entries are droppable at any time, so the cache is a bounded LRU. Every
//! invalidating write bumps an epoch; a load that started before an
//! invalidation returns its result to the caller but never stores it.

use lru::LruCache;
use parking_lot::Mutex;
use shellhub_core::{DocKey, Environment, Metrics};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

struct CacheState {
    entries: LruCache<DocKey, Arc<Environment>>,
    epoch: u64,
}

/// Content cache keyed by (source, id).
pub struct ContentCache {
    state: Mutex<CacheState>,
    metrics: Option<Arc<Metrics>>,
}

impl ContentCache {
    pub fn new(max_documents: usize) -> Self {
        let capacity = NonZeroUsize::new(max_documents).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                epoch: 0,
            }),
            metrics: None,
        }
    }

    /// Report hits and misses of [`ContentCache::get_or_load`] to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn get(&self, key: &DocKey) -> Option<Arc<Environment>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn has(&self, key: &DocKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    pub fn set(&self, key: DocKey, content: Arc<Environment>) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.entries.put(key, content);
    }

    /// Overwrite an entry only if one is cached. Returns whether it was.
    pub fn refresh(&self, key: &DocKey, content: Arc<Environment>) -> bool {
        let mut state = self.state.lock();
        state.epoch += 1;
        match state.entries.get_mut(key) {
            Some(entry) => {
                *entry = content;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &DocKey) -> bool {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.entries.pop(key).is_some()
    }

    /// Drop every entry of one source.
    pub fn remove_source(&self, source: &str) -> usize {
        let mut state = self.state.lock();
        state.epoch += 1;
        let keys: Vec<DocKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.source == source)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            state.entries.pop(key);
        }
        debug!(source, removed = keys.len(), "Dropped cached content");
        keys.len()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached content for `key`, loading and caching it on a miss.
    pub async fn get_or_load<F, Fut, E>(&self, key: &DocKey, load: F) -> Result<Arc<Environment>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Environment, E>>,
    {
        let epoch = {
            let mut state = self.state.lock();
            if let Some(content) = state.entries.get(key).cloned() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit();
                }
                return Ok(content);
            }
            state.epoch
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss();
        }

        let content = Arc::new(load().await?);

        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.entries.put(key.clone(), Arc::clone(&content));
        } else {
            debug!(key = %key, "Skipped caching content invalidated during load");
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellhub_core::content::Submodel;

    fn env(marker: &str) -> Environment {
        Environment {
            shells: vec![],
            submodels: vec![Submodel {
                id: marker.to_string(),
                id_short: None,
                semantic_id: None,
                submodel_elements: vec![],
            }],
        }
    }

    #[test]
    fn test_basic_operations() {
        let cache = ContentCache::new(8);
        let key = DocKey::new("A", "x");
        assert!(!cache.has(&key));

        cache.set(key.clone(), Arc::new(env("v1")));
        assert!(cache.has(&key));
        assert_eq!(cache.get(&key).unwrap().submodels[0].id, "v1");

        assert!(cache.remove(&key));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_refresh_only_existing() {
        let cache = ContentCache::new(8);
        let key = DocKey::new("A", "x");
        assert!(!cache.refresh(&key, Arc::new(env("v2"))));
        assert!(!cache.has(&key));

        cache.set(key.clone(), Arc::new(env("v1")));
        assert!(cache.refresh(&key, Arc::new(env("v2"))));
        assert_eq!(cache.get(&key).unwrap().submodels[0].id, "v2");
    }

    #[test]
    fn test_remove_source_and_clear() {
        let cache = ContentCache::new(8);
        cache.set(DocKey::new("A", "x"), Arc::new(env("x")));
        cache.set(DocKey::new("A", "y"), Arc::new(env("y")));
        cache.set(DocKey::new("B", "z"), Arc::new(env("z")));

        assert_eq!(cache.remove_source("A"), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bounded_eviction() {
        let cache = ContentCache::new(2);
        cache.set(DocKey::new("A", "1"), Arc::new(env("1")));
        cache.set(DocKey::new("A", "2"), Arc::new(env("2")));
        cache.set(DocKey::new("A", "3"), Arc::new(env("3")));
        assert_eq!(cache.len(), 2);
        assert!(!cache.has(&DocKey::new("A", "1")));
    }

    #[tokio::test]
    async fn test_get_or_load_loads_once() {
        let metrics = Arc::new(Metrics::new());
        let cache = ContentCache::new(8).with_metrics(Arc::clone(&metrics));
        let key = DocKey::new("A", "x");

        let first = cache
            .get_or_load(&key, || async { Ok::<_, String>(env("loaded")) })
            .await
            .unwrap();
        let second = cache
            .get_or_load(&key, || async { Err::<Environment, _>("not called".to_string()) })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!((metrics.cache_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_load_racing_invalidation_is_not_cached() {
        let cache = ContentCache::new(8);
        let key = DocKey::new("A", "x");

        let content = cache
            .get_or_load(&key, || async {
                // A Changed event lands while the load is in flight.
                cache.remove(&key);
                Ok::<_, String>(env("stale"))
            })
            .await
            .unwrap();

        assert_eq!(content.submodels[0].id, "stale");
        assert!(!cache.has(&key));
    }

    #[tokio::test]
    async fn test_load_error_propagates() {
        let cache = ContentCache::new(8);
        let key = DocKey::new("A", "x");
        let result = cache
            .get_or_load(&key, || async { Err::<Environment, _>("unreachable") })
            .await;
        assert_eq!(result.unwrap_err(), "unreachable");
        assert!(!cache.has(&key));
    }
}
