//! Caches.
//!
//! Every cache implements [`Cache`]. Identity is the cache id alone: two caches with the
//! same non-empty id are the same cache no matter what they hold. Eviction policies are
//! decorators over a [`Cache`] and are not provided here.

pub mod perpetual;
pub mod transactional;

pub use perpetual::PerpetualCache;
pub use transactional::TransactionalCaches;

use crate::error::{SqlMapError, SqlMapResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Cached value; opaque to the cache.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Composite cache key built from the parts that identify a statement invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one component.
    pub fn update(&mut self, part: impl fmt::Display) {
        self.0.push(part.to_string());
    }

    pub fn with(mut self, part: impl fmt::Display) -> Self {
        self.update(part);
        self
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Key/value store scoped to a session or to a mapping namespace.
///
/// Implementations use interior mutability; a namespace cache is shared by every session
/// of a configuration.
pub trait Cache: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn put(&self, key: CacheKey, value: CacheValue);

    fn get(&self, key: &CacheKey) -> Option<CacheValue>;

    fn remove(&self, key: &CacheKey) -> Option<CacheValue>;

    fn clear(&self);

    fn size(&self) -> usize;

    /// The id used for equality and hashing; empty ids are a configuration error.
    fn identity(&self) -> SqlMapResult<&str> {
        let id = self.id();
        if id.is_empty() {
            Err(SqlMapError::CacheMisconfigured)
        } else {
            Ok(id)
        }
    }
}

/// Whether two caches are the same cache.
pub fn same_cache(a: &dyn Cache, b: &dyn Cache) -> SqlMapResult<bool> {
    Ok(a.identity()? == b.identity()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::new().with("blog.selectAll").with(0).with(10);
        assert_eq!(key.to_string(), "blog.selectAll:0:10");
        assert_eq!(key.parts().len(), 3);
    }

    #[test]
    fn test_same_cache_by_id_not_contents() {
        let a = PerpetualCache::new("blog");
        let b = PerpetualCache::new("blog");
        a.put(CacheKey::new().with(1), Arc::new("one"));
        assert!(same_cache(&a, &b).unwrap());
        assert!(!same_cache(&a, &PerpetualCache::new("author")).unwrap());
    }

    #[test]
    fn test_empty_id_is_misconfigured() {
        let anonymous = PerpetualCache::new("");
        let named = PerpetualCache::new("blog");
        assert!(matches!(
            same_cache(&anonymous, &named),
            Err(SqlMapError::CacheMisconfigured)
        ));
        assert!(matches!(
            anonymous.identity(),
            Err(SqlMapError::CacheMisconfigured)
        ));
    }
}
