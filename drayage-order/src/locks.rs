use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// One async mutex per key. Guards serialize read-check-write sequences
/// on a single order or container without blocking unrelated keys.
/// An entry lives only while someone holds or waits for it.
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: Arc<LockMap<K>>,
}

/// Held lock for one key. Dropping it unlocks and, when nobody else is
/// waiting, removes the key's entry.
pub struct KeyGuard<K: Eq + Hash + Clone> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map's own Arc is the last one left when no task is waiting.
        // Waiters clone under the shard lock, which remove_if also takes.
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock(&self, key: K) -> KeyGuard<K> {
        // Clone the Arc out so the shard lock is released before awaiting
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            key,
        }
    }

    /// Acquire several keys in sorted order to avoid lock-order inversion
    pub async fn lock_many(&self, keys: &[K]) -> Vec<KeyGuard<K>>
    where
        K: Ord,
    {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Keys currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}
