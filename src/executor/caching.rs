use super::{Executor, ExecutorType};
use crate::cache::{PerpetualCache, TransactionalCaches};
use crate::error::SqlMapResult;
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::fmt;

/// Decorator adding second-level cache staging to another executor.
///
/// Namespace cache writes made through [`Executor::transactional_caches`] become visible
/// to other sessions when this executor commits and are dropped when it rolls back.
pub struct CachingExecutor {
    delegate: Box<dyn Executor>,
    caches: TransactionalCaches,
}

impl CachingExecutor {
    pub fn new(delegate: Box<dyn Executor>) -> Self {
        Self {
            delegate,
            caches: TransactionalCaches::new(),
        }
    }
}

#[async_trait]
impl Executor for CachingExecutor {
    fn executor_type(&self) -> ExecutorType {
        self.delegate.executor_type()
    }

    fn transaction(&mut self) -> SqlMapResult<&mut dyn Transaction> {
        self.delegate.transaction()
    }

    fn local_cache(&self) -> &PerpetualCache {
        self.delegate.local_cache()
    }

    async fn update(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.delegate.update(sql).await
    }

    async fn commit(&mut self, required: bool) -> SqlMapResult<()> {
        self.delegate.commit(required).await?;
        self.caches.commit();
        Ok(())
    }

    async fn rollback(&mut self, required: bool) -> SqlMapResult<()> {
        let result = self.delegate.rollback(required).await;
        if required {
            self.caches.rollback();
        }
        result
    }

    async fn close(&mut self, force_rollback: bool) {
        if force_rollback {
            self.caches.rollback();
        } else {
            self.caches.commit();
        }
        self.delegate.close(force_rollback).await;
    }

    fn clear_local_cache(&mut self) {
        self.delegate.clear_local_cache();
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }

    fn transactional_caches(&mut self) -> Option<&mut TransactionalCaches> {
        Some(&mut self.caches)
    }
}

impl fmt::Debug for CachingExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingExecutor")
            .field("delegate", &self.delegate)
            .field("pending_cache_entries", &self.caches.pending())
            .finish()
    }
}
