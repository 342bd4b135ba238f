use super::{Cache, CacheKey, CacheValue};
use crate::error::SqlMapResult;
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use dashmap::DashMap;
use std::hash::{Hash, Hasher};

/// Unbounded map-backed cache. Used for session-local caches and as the default
/// namespace cache.
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: DashMap<CacheKey, CacheValue>,
}

impl PerpetualCache {
    pub const TYPE_NAME: &'static str = "sqlsession::cache::PerpetualCache";

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: DashMap::new(),
        }
    }

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::Cache)
            .with_constructor(Constructor::Cache(Self::boxed))
    }

    fn boxed(id: &str) -> Box<dyn Cache> {
        Box::new(Self::new(id))
    }

    /// Hash of the cache id; fails for an empty id.
    pub fn identity_hash<H: Hasher>(&self, state: &mut H) -> SqlMapResult<()> {
        self.identity()?.hash(state);
        Ok(())
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn remove(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
