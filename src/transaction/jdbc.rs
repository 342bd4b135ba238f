use super::{Transaction, TransactionFactory, TransactionState, generate_transaction_id};
use crate::datasource::{Connection, DataSource, IsolationLevel};
use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::{Properties, parse_flag};
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Transaction that commits and rolls back on its own connection.
///
/// `commit` and `rollback` do nothing while the connection is in auto-commit mode.
/// `close` puts the auto-commit disposition back to what the connection had when it
/// was acquired, unless configured to skip that step.
pub struct JdbcTransaction {
    id: String,
    data_source: Option<Arc<dyn DataSource>>,
    connection: Option<Box<dyn Connection>>,
    level: Option<IsolationLevel>,
    desired_auto_commit: bool,
    original_auto_commit: Option<bool>,
    skip_set_auto_commit_on_close: bool,
    state: TransactionState,
}

impl JdbcTransaction {
    /// Deferred transaction: the connection is taken from `data_source` on first use.
    pub fn new(
        data_source: Option<Arc<dyn DataSource>>,
        level: Option<IsolationLevel>,
        desired_auto_commit: bool,
        skip_set_auto_commit_on_close: bool,
    ) -> Self {
        Self {
            id: generate_transaction_id(),
            data_source,
            connection: None,
            level,
            desired_auto_commit,
            original_auto_commit: None,
            skip_set_auto_commit_on_close,
            state: TransactionState::Unopened,
        }
    }

    /// Transaction over an open connection; its auto-commit disposition is kept.
    pub fn from_connection(connection: Box<dyn Connection>, skip_set_auto_commit_on_close: bool) -> Self {
        let auto_commit = connection.auto_commit().unwrap_or(true);
        Self {
            id: generate_transaction_id(),
            data_source: None,
            connection: Some(connection),
            level: None,
            desired_auto_commit: auto_commit,
            original_auto_commit: Some(auto_commit),
            skip_set_auto_commit_on_close,
            state: TransactionState::Open,
        }
    }

    /// Auto-commit the connection had when it was acquired.
    pub fn original_auto_commit(&self) -> Option<bool> {
        self.original_auto_commit
    }

    async fn open_connection(&mut self) -> SqlMapResult<()> {
        if self.state == TransactionState::Closed {
            return Err(SqlMapError::transaction(format!(
                "Transaction {} is closed",
                self.id
            )));
        }
        let data_source = self.data_source.as_ref().ok_or_else(|| {
            SqlMapError::transaction("No data source is configured for this transaction")
        })?;

        debug!(transaction_id = %self.id, "Opening connection");
        let mut connection = data_source.connection().await?;
        let original = connection.auto_commit()?;
        if let Some(level) = self.level {
            connection.set_isolation_level(level).await?;
        }
        if original != self.desired_auto_commit {
            debug!(
                transaction_id = %self.id,
                auto_commit = self.desired_auto_commit,
                "Setting auto-commit"
            );
            connection
                .set_auto_commit(self.desired_auto_commit)
                .await
                .map_err(|e| {
                    SqlMapError::transaction(format!(
                        "Error configuring auto-commit. Requested setting: {}. Cause: {}",
                        self.desired_auto_commit, e
                    ))
                })?;
        }
        self.original_auto_commit = Some(original);
        self.connection = Some(connection);
        self.state = TransactionState::Open;
        Ok(())
    }

    /// Put auto-commit back on the connection. Failures are logged only.
    async fn reset_auto_commit(&mut self) {
        let Some(original) = self.original_auto_commit else {
            return;
        };
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        match connection.auto_commit() {
            Ok(current) if current == original => {}
            Ok(_) => {
                debug!(transaction_id = %self.id, auto_commit = original, "Resetting auto-commit");
                if let Err(e) = connection.set_auto_commit(original).await {
                    warn!(
                        transaction_id = %self.id,
                        error = %e,
                        "Error resetting auto-commit before closing the connection"
                    );
                }
            }
            Err(e) => warn!(
                transaction_id = %self.id,
                error = %e,
                "Could not read auto-commit before closing the connection"
            ),
        }
    }
}

#[async_trait]
impl Transaction for JdbcTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connection(&mut self) -> SqlMapResult<&mut dyn Connection> {
        if self.connection.is_none() {
            self.open_connection().await?;
        }
        let connection: &mut dyn Connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| SqlMapError::transaction("Connection is not available"))?;
        Ok(connection)
    }

    async fn commit(&mut self) -> SqlMapResult<()> {
        if let Some(connection) = self.connection.as_mut() {
            if !connection.auto_commit()? {
                debug!(transaction_id = %self.id, "Committing connection");
                connection.commit().await?;
                self.state = TransactionState::Committed;
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> SqlMapResult<()> {
        if let Some(connection) = self.connection.as_mut() {
            if !connection.auto_commit()? {
                debug!(transaction_id = %self.id, "Rolling back connection");
                connection.rollback().await?;
                self.state = TransactionState::RolledBack;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> SqlMapResult<()> {
        if self.state == TransactionState::Closed {
            return Ok(());
        }
        if !self.skip_set_auto_commit_on_close {
            self.reset_auto_commit().await;
        }
        self.state = TransactionState::Closed;
        match self.connection.take() {
            Some(connection) => {
                debug!(transaction_id = %self.id, "Closing connection");
                connection.close().await
            }
            None => Ok(()),
        }
    }

    fn state(&self) -> TransactionState {
        self.state
    }
}

impl fmt::Debug for JdbcTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JdbcTransaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("level", &self.level)
            .field("desired_auto_commit", &self.desired_auto_commit)
            .field("has_connection", &self.connection.is_some())
            .finish()
    }
}

/// Factory registered as `JDBC`.
///
/// Property `skipSetAutoCommitOnClose=true` leaves auto-commit untouched on close.
#[derive(Debug, Default)]
pub struct JdbcTransactionFactory {
    skip_set_auto_commit_on_close: bool,
}

impl JdbcTransactionFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::transaction::JdbcTransactionFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::TransactionFactory)
            .with_constructor(Constructor::TransactionFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn TransactionFactory> {
        Box::new(Self::default())
    }
}

impl TransactionFactory for JdbcTransactionFactory {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        if let Some(value) = properties.get("skipSetAutoCommitOnClose") {
            self.skip_set_auto_commit_on_close = parse_flag("skipSetAutoCommitOnClose", value)?;
        }
        Ok(())
    }

    fn new_transaction(
        &self,
        data_source: Option<Arc<dyn DataSource>>,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> SqlMapResult<Box<dyn Transaction>> {
        Ok(Box::new(JdbcTransaction::new(
            data_source,
            level,
            auto_commit,
            self.skip_set_auto_commit_on_close,
        )))
    }

    fn new_transaction_from_connection(
        &self,
        connection: Box<dyn Connection>,
    ) -> SqlMapResult<Box<dyn Transaction>> {
        Ok(Box::new(JdbcTransaction::from_connection(
            connection,
            self.skip_set_auto_commit_on_close,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, RecordingConnection, RecordingDataSource};

    fn deferred(log: &CallLog, auto_commit: bool) -> JdbcTransaction {
        let ds: Arc<dyn DataSource> = Arc::new(RecordingDataSource::new(log.clone()));
        JdbcTransaction::new(Some(ds), None, auto_commit, false)
    }

    #[tokio::test]
    async fn test_connection_is_acquired_lazily() {
        let log = CallLog::default();
        let mut tx = deferred(&log, false);
        assert_eq!(tx.state(), TransactionState::Unopened);
        assert!(log.calls().is_empty());

        tx.connection().await.unwrap();
        tx.connection().await.unwrap();
        assert_eq!(log.count("connect"), 1);
        assert_eq!(tx.state(), TransactionState::Open);
        assert_eq!(tx.original_auto_commit(), Some(true));
    }

    #[tokio::test]
    async fn test_commit_and_rollback_are_noops_under_auto_commit() {
        let log = CallLog::default();
        let mut tx = deferred(&log, true);
        tx.connection().await.unwrap();
        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(log.count("commit"), 0);
        assert_eq!(log.count("rollback"), 0);
        assert_eq!(tx.state(), TransactionState::Open);
    }

    #[tokio::test]
    async fn test_manual_commit_then_close_restores_auto_commit() {
        let log = CallLog::default();
        let mut tx = deferred(&log, false);
        tx.connection().await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        tx.rollback().await.unwrap();
        assert_eq!(tx.state(), TransactionState::RolledBack);

        tx.close().await.unwrap();
        assert_eq!(
            log.calls(),
            vec![
                "connect",
                "set_auto_commit(false)",
                "commit",
                "rollback",
                "set_auto_commit(true)",
                "close"
            ]
        );
        assert_eq!(tx.state(), TransactionState::Closed);

        tx.close().await.unwrap();
        assert_eq!(log.count("close"), 1);
    }

    #[tokio::test]
    async fn test_isolation_level_applied_on_open() {
        let log = CallLog::default();
        let ds: Arc<dyn DataSource> = Arc::new(RecordingDataSource::new(log.clone()));
        let mut tx = JdbcTransaction::new(Some(ds), Some(IsolationLevel::Serializable), true, false);
        tx.connection().await.unwrap();
        assert_eq!(log.calls(), vec!["connect", "set_isolation_level(SERIALIZABLE)"]);
    }

    #[tokio::test]
    async fn test_reset_failure_is_swallowed() {
        let log = CallLog::default();
        let mut source = RecordingDataSource::new(log.clone());
        source.fail_auto_commit_reset = true;
        let ds: Arc<dyn DataSource> = Arc::new(source);
        let mut tx = JdbcTransaction::new(Some(ds), None, false, false);
        tx.connection().await.unwrap();

        tx.close().await.unwrap();
        assert_eq!(
            log.calls(),
            vec!["connect", "set_auto_commit(false)", "set_auto_commit(true)", "close"]
        );
        assert_eq!(tx.state(), TransactionState::Closed);
    }

    #[tokio::test]
    async fn test_wrapped_connection_keeps_its_disposition() {
        let log = CallLog::default();
        let mut conn = RecordingConnection::new(log.clone());
        conn.auto_commit = false;
        let mut tx = JdbcTransaction::from_connection(Box::new(conn), false);
        assert_eq!(tx.original_auto_commit(), Some(false));

        tx.commit().await.unwrap();
        tx.close().await.unwrap();
        assert_eq!(log.calls(), vec!["commit", "close"]);
    }

    #[test]
    fn test_skip_set_auto_commit_on_close_rejects_non_boolean() {
        let mut factory = JdbcTransactionFactory::default();
        let mut props = Properties::new();
        props.insert("skipSetAutoCommitOnClose".into(), "yes".into());
        let err = factory.set_properties(&props).unwrap_err();
        assert!(matches!(
            err,
            SqlMapError::InvalidSetting { ref key, .. } if key == "skipSetAutoCommitOnClose"
        ));
    }

    #[tokio::test]
    async fn test_skip_set_auto_commit_on_close() {
        let log = CallLog::default();
        let mut factory = JdbcTransactionFactory::default();
        let mut props = Properties::new();
        props.insert("skipSetAutoCommitOnClose".into(), "true".into());
        factory.set_properties(&props).unwrap();

        let ds: Arc<dyn DataSource> = Arc::new(RecordingDataSource::new(log.clone()));
        let mut tx = factory.new_transaction(Some(ds), None, false).unwrap();
        tx.connection().await.unwrap();
        tx.close().await.unwrap();
        assert_eq!(log.calls(), vec!["connect", "set_auto_commit(false)", "close"]);
    }

    #[tokio::test]
    async fn test_wrapped_connection_auto_commit_defaults_to_true_when_unreadable() {
        let log = CallLog::default();
        let mut conn = RecordingConnection::new(log.clone());
        conn.fail_auto_commit_query = true;
        let tx = JdbcTransaction::from_connection(Box::new(conn), false);
        assert_eq!(tx.original_auto_commit(), Some(true));
        assert_eq!(tx.state(), TransactionState::Open);
        assert!(tx.timeout().is_none());
    }

    #[tokio::test]
    async fn test_missing_data_source_fails_on_first_use() {
        let mut tx = JdbcTransaction::new(None, None, false, false);
        let err = tx.connection().await.err().unwrap();
        assert!(matches!(err, SqlMapError::Transaction { .. }));
        tx.close().await.unwrap();
    }
}
