//! Executors bound to a transaction.
//!
//! Statement compilation and result mapping live outside this crate; an executor here
//! owns the transaction, the session-local cache and the commit/rollback/close protocol
//! that sessions and interceptors build on.

pub mod base;
pub mod caching;

pub use base::BaseExecutor;
pub use caching::CachingExecutor;

use crate::cache::{PerpetualCache, TransactionalCaches};
use crate::error::SqlMapResult;
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::fmt;

string_enum! {
    /// Statement execution strategy.
    pub enum ExecutorType {
        Simple => "SIMPLE",
        Reuse => "REUSE",
        Batch => "BATCH",
    }
}

impl Default for ExecutorType {
    fn default() -> Self {
        Self::Simple
    }
}

#[async_trait]
pub trait Executor: Send + fmt::Debug {
    fn executor_type(&self) -> ExecutorType;

    /// The transaction; fails once the executor is closed.
    fn transaction(&mut self) -> SqlMapResult<&mut dyn Transaction>;

    /// Session-local cache.
    fn local_cache(&self) -> &PerpetualCache;

    /// Run a raw data-changing statement. Clears the local cache first.
    async fn update(&mut self, sql: &str) -> SqlMapResult<u64>;

    /// Commit; the transaction is only told to commit when `required`.
    async fn commit(&mut self, required: bool) -> SqlMapResult<()>;

    /// Roll back; the transaction is only told to roll back when `required`.
    async fn rollback(&mut self, required: bool) -> SqlMapResult<()>;

    /// Close the transaction, rolling back first when `force_rollback`. Never fails.
    async fn close(&mut self, force_rollback: bool);

    fn clear_local_cache(&mut self);

    fn is_closed(&self) -> bool;

    /// Staged namespace cache writes, when second-level caching is on.
    fn transactional_caches(&mut self) -> Option<&mut TransactionalCaches> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_type_default_and_parse() {
        assert_eq!(ExecutorType::default(), ExecutorType::Simple);
        assert_eq!("BATCH".parse::<ExecutorType>().unwrap(), ExecutorType::Batch);
        assert!("batch".parse::<ExecutorType>().is_err());
    }
}
