use super::configuration::Configuration;
use super::settings::LocalCacheScope;
use crate::cache::{CacheKey, CacheValue};
use crate::datasource::Connection;
use crate::error::{SqlMapError, SqlMapResult};
use crate::executor::Executor;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One unit of work against the configured data source.
///
/// A session is owned by one task at a time. Work done through it becomes durable on
/// [`commit`](Self::commit); [`close`](Self::close) rolls back anything left uncommitted.
pub struct SqlSession {
    configuration: Arc<Configuration>,
    executor: Box<dyn Executor>,
    auto_commit: bool,
    dirty: bool,
}

impl SqlSession {
    pub(crate) fn new(
        configuration: Arc<Configuration>,
        executor: Box<dyn Executor>,
        auto_commit: bool,
    ) -> Self {
        Self {
            configuration,
            executor,
            auto_commit,
            dirty: false,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Whether statements ran since the last commit or rollback.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.executor.is_closed()
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Run a data-changing statement and return the affected row count.
    pub async fn update(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.dirty = true;
        let rows = self.executor.update(sql).await?;
        if self.configuration.settings().local_cache_scope == LocalCacheScope::Statement {
            self.executor.clear_local_cache();
        }
        Ok(rows)
    }

    pub async fn insert(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.update(sql).await
    }

    pub async fn delete(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.update(sql).await
    }

    /// Run the mapped statement `id`.
    pub async fn update_mapped(&mut self, id: &str) -> SqlMapResult<u64> {
        let sql = self
            .configuration
            .mapped_statement(id)
            .map(|statement| statement.sql.clone())
            .ok_or_else(|| {
                SqlMapError::component("SqlSession", format!("Mapped statement '{}' is not registered", id))
            })?;
        self.update(&sql).await
    }

    /// Commit. The transaction is told to commit when there is uncommitted work outside
    /// auto-commit, or when `force` is set.
    pub async fn commit(&mut self, force: bool) -> SqlMapResult<()> {
        let required = self.commit_or_rollback_required(force);
        self.executor.commit(required).await?;
        self.dirty = false;
        Ok(())
    }

    /// Roll back, under the same rule as [`commit`](Self::commit).
    pub async fn rollback(&mut self, force: bool) -> SqlMapResult<()> {
        let required = self.commit_or_rollback_required(force);
        self.executor.rollback(required).await?;
        self.dirty = false;
        Ok(())
    }

    /// The connection of the session's transaction, opened on first use.
    pub async fn connection(&mut self) -> SqlMapResult<&mut dyn Connection> {
        self.executor.transaction()?.connection().await
    }

    pub fn clear_cache(&mut self) {
        self.executor.clear_local_cache();
    }

    /// Stage a value for the namespace cache `namespace`.
    ///
    /// The value becomes visible to other sessions on commit. Returns false when the
    /// namespace has no cache or second-level caching is disabled.
    pub fn put_cached(&mut self, namespace: &str, key: CacheKey, value: CacheValue) -> bool {
        let Some(cache) = self.configuration.cache(namespace).cloned() else {
            return false;
        };
        match self.executor.transactional_caches() {
            Some(staged) => {
                staged.put(&cache, key, value);
                true
            }
            None => false,
        }
    }

    /// Read from the namespace cache `namespace`, honouring a pending clear.
    pub fn get_cached(&mut self, namespace: &str, key: &CacheKey) -> Option<CacheValue> {
        let cache = self.configuration.cache(namespace).cloned()?;
        self.executor
            .transactional_caches()
            .and_then(|staged| staged.get(&cache, key))
    }

    /// Close the session, rolling back uncommitted work. Never fails.
    pub async fn close(&mut self) {
        let force_rollback = self.commit_or_rollback_required(false);
        self.executor.close(force_rollback).await;
        self.dirty = false;
        debug!("Session closed");
    }

    fn commit_or_rollback_required(&self, force: bool) -> bool {
        (!self.auto_commit && self.dirty) || force
    }
}

impl fmt::Debug for SqlSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlSession")
            .field("executor", &self.executor)
            .field("auto_commit", &self.auto_commit)
            .field("dirty", &self.dirty)
            .finish()
    }
}
