//! Bounded segmentation cache shared by the subword models.
//!
//! Lookups take the shared side of an [`RwLock`] and never update recency, so
//! any number of threads can read at once. Inserts take the exclusive side;
//! the capacity check, insert, and eviction all happen under that one lock.
//! Neither side blocks: a contended lock is treated as a miss (for reads) or a
//! skipped insert (for writes).

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use lru::LruCache;
use tracing::trace;

/// Default number of entries kept by a model cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

pub struct Cache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    map: RwLock<LruCache<K, V>>,
    capacity: NonZeroUsize,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create an empty cache holding at most `capacity` entries.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries before eviction starts
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            map: RwLock::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// A cache of capacity `capacity`, or `None` when `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(Self::new)
    }

    /// An empty cache with the same capacity.
    pub fn fresh(&self) -> Self {
        Self::new(self.capacity)
    }

    /// Clone of the value stored under `key`.
    ///
    /// Returns `None` on a miss, or when a writer holds the lock.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.try_read().ok()?.peek(key).cloned()
    }

    /// Insert one entry. Skipped silently when the lock is contended.
    pub fn set(&self, key: K, value: V) {
        self.set_values(std::iter::once((key, value)));
    }

    /// Insert several entries under a single write lock, evicting the least
    /// recently inserted ones past capacity.
    pub fn set_values<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        match self.map.try_write() {
            Ok(mut map) => {
                for (key, value) in entries {
                    map.put(key, value);
                }
            }
            Err(_) => trace!("cache busy, skipping insert"),
        }
    }

    /// Drop every entry, waiting for the lock if needed.
    pub fn clear(&self) {
        if let Ok(mut map) = self.map.write() {
            map.clear();
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl<K, V> Clone for Cache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn clone(&self) -> Self {
        self.fresh()
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zero_capacity_disables() {
        assert!(Cache::<String, u32>::with_capacity(0).is_none());
    }

    #[test]
    fn test_get_set() {
        let cache: Cache<String, u32> = Cache::with_capacity(4).unwrap();
        assert_eq!(cache.get("a"), None);
        cache.set("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded() {
        let cache: Cache<u32, u32> = Cache::with_capacity(3).unwrap();
        cache.set_values((0..10).map(|i| (i, i * 10)));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&0), None);
        assert_eq!(cache.get(&9), Some(90));
    }

    #[test]
    fn test_clone_is_empty() {
        let cache: Cache<u32, u32> = Cache::with_capacity(2).unwrap();
        cache.set(1, 1);
        let cloned = cache.clone();
        assert!(cloned.is_empty());
        assert_eq!(cloned.capacity(), 2);
    }

    #[test]
    fn test_concurrent_access_stays_bounded() {
        let cache: Arc<Cache<u32, u32>> = Arc::new(Cache::with_capacity(16).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let key = t * 1000 + i;
                        cache.set(key, key);
                        if let Some(v) = cache.get(&key) {
                            assert_eq!(v, key);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
