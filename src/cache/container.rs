use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::core::error::Result;
use crate::documents::container::DocContainer;
use crate::postings::shard::ShardHandle;
use crate::storage::descriptor::SegmentVersion;
use crate::trie::node::Trie;

struct Slot<V> {
    value: Mutex<Option<Arc<V>>>,
}

/// Process-lifetime lazy cache: at most one load per key. A first caller
/// loads under the key's own mutex while concurrent callers for that key
/// wait on the same load; no lock is held across loads for other keys.
/// A failed load leaves the slot empty so a later call may retry.
pub struct LazyCache<K, V> {
    slots: Mutex<HashMap<K, Arc<Slot<V>>>>,
}

impl<K: Eq + Hash + Clone, V> LazyCache<K, V> {
    pub fn new() -> Self {
        LazyCache { slots: Mutex::new(HashMap::new()) }
    }

    pub fn get_or_load(&self, key: &K, loader: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
        let slot = {
            let mut slots = self.slots.lock();
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot { value: Mutex::new(None) }))
                .clone()
        };

        let mut value = slot.value.lock();
        if let Some(loaded) = value.as_ref() {
            return Ok(loaded.clone());
        }
        let loaded = Arc::new(loader()?);
        *value = Some(loaded.clone());
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Drop every entry whose key matches `predicate`.
    pub fn evict_where(&self, predicate: impl Fn(&K) -> bool) {
        self.slots.lock().retain(|key, _| !predicate(key));
    }
}

impl<K: Eq + Hash + Clone, V> Default for LazyCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The opened-container caches for one searcher, keyed by segment
/// version plus field or shard identity. Handles are immutable once
/// published and shared freely across collectors.
pub struct SegmentCaches {
    pub tries: LazyCache<(SegmentVersion, String), Trie>,
    pub shards: LazyCache<(SegmentVersion, u8), ShardHandle>,
    pub documents: LazyCache<SegmentVersion, DocContainer>,
}

impl SegmentCaches {
    pub fn new() -> Self {
        SegmentCaches {
            tries: LazyCache::new(),
            shards: LazyCache::new(),
            documents: LazyCache::new(),
        }
    }

    /// Eviction hook for a segment deleted by the write path. The next
    /// access re-loads and surfaces an I/O failure if the files are gone,
    /// instead of silently serving stale containers.
    pub fn evict_segment(&self, version: SegmentVersion) {
        self.tries.evict_where(|(v, _)| *v == version);
        self.shards.evict_where(|(v, _)| *v == version);
        self.documents.evict_where(|v| *v == version);
    }
}

impl Default for SegmentCaches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use crate::core::error::{Error, ErrorKind};

    #[test]
    fn loader_runs_exactly_once_per_key_under_contention() {
        let cache: Arc<LazyCache<u64, u64>> = Arc::new(LazyCache::new());
        let loads = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let loads = loads.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let value = cache
                        .get_or_load(&42, || {
                            loads.fetch_add(1, Ordering::SeqCst);
                            Ok(1337)
                        })
                        .unwrap();
                    assert_eq!(*value, 1337);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_loads_are_retried() {
        let cache: LazyCache<u64, u64> = LazyCache::new();
        let err = cache
            .get_or_load(&1, || Err(Error::new(ErrorKind::Io, "gone".to_string())))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);

        let value = cache.get_or_load(&1, || Ok(7)).unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn eviction_forces_a_reload() {
        let cache: LazyCache<u64, u64> = LazyCache::new();
        cache.get_or_load(&1, || Ok(1)).unwrap();
        cache.get_or_load(&2, || Ok(2)).unwrap();

        cache.evict_where(|k| *k == 1);
        assert_eq!(cache.len(), 1);

        let reloaded = cache.get_or_load(&1, || Ok(10)).unwrap();
        assert_eq!(*reloaded, 10);
    }
}
