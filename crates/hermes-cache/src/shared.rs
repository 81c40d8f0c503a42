//! Thread-safe cache handle

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::RecencyCache;

/// Cloneable handle to a mutex-guarded [`RecencyCache`]
///
/// All clones share the same storage. Values are cloned out on `get` so the
/// lock is never held by a caller.
#[derive(Debug)]
pub struct SharedCache<K, V> {
    inner: Arc<Mutex<RecencyCache<K, V>>>,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        SharedCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> SharedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        SharedCache {
            inner: Arc::new(Mutex::new(RecencyCache::new(capacity))),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().set(key, value);
    }

    pub fn del<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().pop(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
