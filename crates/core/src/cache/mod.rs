//! Bounded store of parsed classes.
//!
//! The budget is counted in bytes of source text (`text.len()` of each retained
//! class). Inserting past the budget evicts least-recently-used classes until the
//! total fits again. Only materialized classes are dropped; the index keeps every
//! file's identity and class identifier regardless of what the cache holds.

use crate::model::Class;
use crate::project::FileId;
use lru::LruCache;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct ClassCache {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    max_bytes: usize,
    total_bytes: usize,
    lru: LruCache<FileId, Arc<Class>>,
}

fn cost(class: &Class) -> usize {
    class.text().len()
}

impl ClassCache {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_bytes,
                total_bytes: 0,
                lru: LruCache::unbounded(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `class` for `file` and returns the files whose classes were evicted.
    pub fn insert(&self, file: FileId, class: Arc<Class>) -> Vec<FileId> {
        let bytes = cost(&class);
        let mut inner = self.lock();
        let mut evicted = Vec::new();

        // A class that can never fit is not retained, and neither is its predecessor.
        if bytes > inner.max_bytes {
            if let Some(prev) = inner.lru.pop(&file) {
                inner.total_bytes = inner.total_bytes.saturating_sub(cost(&prev));
            }
            evicted.push(file);
            return evicted;
        }

        if let Some(prev) = inner.lru.put(file, class) {
            inner.total_bytes = inner.total_bytes.saturating_sub(cost(&prev));
        }
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);

        while inner.total_bytes > inner.max_bytes {
            let Some((evicted_file, evicted_class)) = inner.lru.pop_lru() else {
                inner.total_bytes = 0;
                break;
            };
            inner.total_bytes = inner.total_bytes.saturating_sub(cost(&evicted_class));
            evicted.push(evicted_file);
        }
        evicted
    }

    /// Looks up and marks as recently used.
    pub fn get(&self, file: &FileId) -> Option<Arc<Class>> {
        self.lock().lru.get(file).cloned()
    }

    pub fn contains(&self, file: &FileId) -> bool {
        self.lock().lru.contains(file)
    }

    pub fn remove(&self, file: &FileId) -> Option<Arc<Class>> {
        let mut inner = self.lock();
        let prev = inner.lru.pop(file)?;
        inner.total_bytes = inner.total_bytes.saturating_sub(cost(&prev));
        Some(prev)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.lock().max_bytes
    }
}
