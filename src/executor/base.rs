use super::{Executor, ExecutorType};
use crate::cache::{Cache, PerpetualCache};
use crate::error::{SqlMapError, SqlMapResult};
use crate::transaction::Transaction;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// Id of every session-local cache.
pub const LOCAL_CACHE_ID: &str = "LocalCache";

/// Executor that owns a transaction and a session-local cache.
pub struct BaseExecutor {
    executor_type: ExecutorType,
    transaction: Box<dyn Transaction>,
    local_cache: PerpetualCache,
    closed: bool,
}

impl BaseExecutor {
    pub fn new(transaction: Box<dyn Transaction>, executor_type: ExecutorType) -> Self {
        Self {
            executor_type,
            transaction,
            local_cache: PerpetualCache::new(LOCAL_CACHE_ID),
            closed: false,
        }
    }

    fn ensure_open(&self, action: &str) -> SqlMapResult<()> {
        if self.closed {
            Err(SqlMapError::transaction(format!(
                "Cannot {}, executor was closed",
                action
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Executor for BaseExecutor {
    fn executor_type(&self) -> ExecutorType {
        self.executor_type
    }

    fn transaction(&mut self) -> SqlMapResult<&mut dyn Transaction> {
        self.ensure_open("use the transaction")?;
        Ok(self.transaction.as_mut())
    }

    fn local_cache(&self) -> &PerpetualCache {
        &self.local_cache
    }

    async fn update(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.ensure_open("update")?;
        self.clear_local_cache();
        let connection = self.transaction.connection().await?;
        connection.execute(sql).await
    }

    async fn commit(&mut self, required: bool) -> SqlMapResult<()> {
        self.ensure_open("commit")?;
        self.clear_local_cache();
        if required {
            self.transaction.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self, required: bool) -> SqlMapResult<()> {
        if self.closed {
            return Ok(());
        }
        self.clear_local_cache();
        if required {
            self.transaction.rollback().await?;
        }
        Ok(())
    }

    async fn close(&mut self, force_rollback: bool) {
        if self.closed {
            return;
        }
        if let Err(e) = self.rollback(force_rollback).await {
            warn!(
                transaction_id = %self.transaction.id(),
                error = %e,
                "Unexpected error rolling back before close"
            );
        }
        if let Err(e) = self.transaction.close().await {
            warn!(
                transaction_id = %self.transaction.id(),
                error = %e,
                "Unexpected error closing transaction"
            );
        }
        self.local_cache.clear();
        self.closed = true;
        debug!(transaction_id = %self.transaction.id(), "Executor closed");
    }

    fn clear_local_cache(&mut self) {
        if !self.closed {
            self.local_cache.clear();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for BaseExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseExecutor")
            .field("executor_type", &self.executor_type)
            .field("transaction", &self.transaction)
            .field("local_cache_size", &self.local_cache.size())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::datasource::DataSource;
    use crate::test_support::{CallLog, RecordingDataSource};
    use crate::transaction::{JdbcTransaction, TransactionState};
    use std::sync::Arc;

    fn executor(log: &CallLog) -> BaseExecutor {
        let ds: Arc<dyn DataSource> = Arc::new(RecordingDataSource::new(log.clone()));
        let tx = JdbcTransaction::new(Some(ds), None, false, false);
        BaseExecutor::new(Box::new(tx), ExecutorType::Simple)
    }

    #[tokio::test]
    async fn test_commit_clears_local_cache_and_honours_required() {
        let log = CallLog::default();
        let mut exec = executor(&log);
        exec.update("INSERT INTO t VALUES (1)").await.unwrap();
        exec.local_cache()
            .put(CacheKey::new().with("q"), Arc::new(1u8));

        exec.commit(false).await.unwrap();
        assert_eq!(exec.local_cache().size(), 0);
        assert_eq!(log.count("commit"), 0);

        exec.commit(true).await.unwrap();
        assert_eq!(log.count("commit"), 1);
    }

    #[tokio::test]
    async fn test_close_rolls_back_when_forced_and_closes_transaction() {
        let log = CallLog::default();
        let mut exec = executor(&log);
        exec.update("DELETE FROM t").await.unwrap();
        exec.close(true).await;

        assert!(exec.is_closed());
        assert_eq!(log.count("rollback"), 1);
        assert_eq!(log.count("close"), 1);
        assert!(exec.transaction().is_err());
        assert!(exec.commit(true).await.is_err());

        exec.close(true).await;
        assert_eq!(log.count("close"), 1);
    }

    #[tokio::test]
    async fn test_close_without_connection_is_quiet() {
        let log = CallLog::default();
        let mut exec = executor(&log);
        assert_eq!(exec.transaction().unwrap().state(), TransactionState::Unopened);
        exec.close(false).await;
        assert!(log.calls().is_empty());
    }
}
