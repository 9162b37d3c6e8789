use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Slots<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// Async mutex per key. Holders of different keys never contend; holders of the same key
/// run one at a time in arrival order. A key's slot lives only while someone holds or
/// waits on it.
#[derive(Debug)]
pub struct KeyedMutex<K>
where
    K: Eq + Hash,
{
    slots: Slots<K>,
}

/// Held lock on one key of a [`KeyedMutex`].
#[derive(Debug)]
pub struct KeyedGuard<K>
where
    K: Eq + Hash,
{
    // Field order matters: the mutex guard is released before the slot is reclaimed.
    _guard: OwnedMutexGuard<()>,
    _release: Release<K>,
}

#[derive(Debug)]
struct Release<K>
where
    K: Eq + Hash,
{
    key: K,
    slots: Slots<K>,
}

impl<K> Drop for Release<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let slot = self.slots.entry(key.clone()).or_default().clone();
        let release = Release {
            key,
            slots: self.slots.clone(),
        };
        let guard = slot.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _release: release,
        }
    }

    /// Keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
