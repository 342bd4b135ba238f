use super::{Cache, CacheKey, CacheValue};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct StagedCache {
    cache: Arc<dyn Cache>,
    clear_on_commit: bool,
    entries: HashMap<CacheKey, CacheValue>,
}

impl StagedCache {
    fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            clear_on_commit: false,
            entries: HashMap::new(),
        }
    }
}

/// Namespace cache writes staged for the current unit of work.
///
/// Shared caches only see the writes of a session once it commits; a rollback discards them.
#[derive(Debug, Default)]
pub struct TransactionalCaches {
    staged: HashMap<String, StagedCache>,
}

impl TransactionalCaches {
    pub fn new() -> Self {
        Self::default()
    }

    fn stage(&mut self, cache: &Arc<dyn Cache>) -> &mut StagedCache {
        self.staged
            .entry(cache.id().to_string())
            .or_insert_with(|| StagedCache::new(Arc::clone(cache)))
    }

    pub fn put(&mut self, cache: &Arc<dyn Cache>, key: CacheKey, value: CacheValue) {
        self.stage(cache).entries.insert(key, value);
    }

    /// Read through to the shared cache unless it is about to be cleared.
    pub fn get(&self, cache: &Arc<dyn Cache>, key: &CacheKey) -> Option<CacheValue> {
        match self.staged.get(cache.id()) {
            Some(staged) if staged.clear_on_commit => None,
            _ => cache.get(key),
        }
    }

    /// Clear the shared cache when the unit of work commits.
    pub fn clear(&mut self, cache: &Arc<dyn Cache>) {
        let staged = self.stage(cache);
        staged.clear_on_commit = true;
        staged.entries.clear();
    }

    /// Publish staged writes to the shared caches.
    pub fn commit(&mut self) {
        for (_, staged) in self.staged.drain() {
            if staged.clear_on_commit {
                staged.cache.clear();
            }
            for (key, value) in staged.entries {
                staged.cache.put(key, value);
            }
        }
    }

    /// Drop staged writes.
    pub fn rollback(&mut self) {
        self.staged.clear();
    }

    /// Number of staged entries across all caches.
    pub fn pending(&self) -> usize {
        self.staged.values().map(|s| s.entries.len()).sum()
    }
}
