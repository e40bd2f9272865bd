use std::collections::VecDeque;
use std::hash::Hash;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Insertion-ordered, capacity-bounded map.
///
/// The first value written for a key is kept for the key's lifetime in the
/// cache; later writes for the same key are ignored. When an insert pushes
/// the cache past capacity the oldest key is evicted.
pub struct BoundedCache<K, V> {
    capacity: usize,
    inner: Mutex<CacheInner<K, V>>,
}

struct CacheInner<K, V> {
    entries: FxHashMap<K, V>,
    order: VecDeque<K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                entries: FxHashMap::default(),
                order: VecDeque::new(),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert unless the key is present. Returns the value now stored.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        self.get_or_insert_with(key, || value)
    }

    /// Look up `key`, minting and inserting a value under the same lock when
    /// it is missing.
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(&key) {
            return existing.clone();
        }
        let value = make();
        inner.entries.insert(key.clone(), value.clone());
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        value
    }
}
