use super::configuration::Configuration;
use super::sqlsession::SqlSession;
use crate::datasource::{Connection, IsolationLevel};
use crate::diagnostics::ErrorContext;
use crate::error::{SqlMapError, SqlMapResult};
use crate::executor::{Executor, ExecutorType};
use crate::plugin::PluginRejected;
use crate::transaction::{ManagedTransactionFactory, TransactionFactory};
use std::sync::Arc;
use tracing::{debug, info};

/// Options for [`SqlSessionFactory::open_session_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Defaults to the configured `defaultExecutorType`.
    pub executor_type: Option<ExecutorType>,
    pub isolation_level: Option<IsolationLevel>,
    pub auto_commit: bool,
}

impl SessionOptions {
    pub fn executor_type(mut self, executor_type: ExecutorType) -> Self {
        self.executor_type = Some(executor_type);
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }
}

/// Why assembling a session failed, with whatever must be cleaned up.
struct Failed {
    error: SqlMapError,
    context: String,
    executor: Option<Box<dyn Executor>>,
}

/// Opens sessions over a resolved configuration.
///
/// The factory is cheap to clone and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct SqlSessionFactory {
    configuration: Arc<Configuration>,
}

impl SqlSessionFactory {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration: Arc::new(configuration),
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Session with the default executor, no isolation override and auto-commit off.
    pub async fn open_session(&self) -> SqlMapResult<SqlSession> {
        self.open_session_with(SessionOptions::default()).await
    }

    /// Session whose transaction takes its connection from the environment's data source.
    pub async fn open_session_with(&self, options: SessionOptions) -> SqlMapResult<SqlSession> {
        let executor_type = options
            .executor_type
            .unwrap_or(self.configuration.settings().default_executor_type);
        let assembled = {
            let _scope = ErrorContext::scope("SqlSessionFactory");
            ErrorContext::set_activity("opening a session from the data source");
            self.assemble_from_data_source(&options, executor_type)
        };
        let session = self.finish(assembled, options.auto_commit).await?;
        info!(
            environment = ?self.configuration.environment().map(|env| env.id()),
            executor_type = %executor_type,
            auto_commit = options.auto_commit,
            "Opened session"
        );
        Ok(session)
    }

    /// Session over a connection the caller already holds.
    ///
    /// The session's auto-commit flag is read from the connection, defaulting to true
    /// when it cannot be read.
    pub async fn open_session_with_connection(
        &self,
        connection: Box<dyn Connection>,
        executor_type: Option<ExecutorType>,
    ) -> SqlMapResult<SqlSession> {
        let executor_type =
            executor_type.unwrap_or(self.configuration.settings().default_executor_type);
        let auto_commit = connection.auto_commit().unwrap_or(true);
        let assembled = {
            let _scope = ErrorContext::scope("SqlSessionFactory");
            ErrorContext::set_activity("opening a session from a connection");
            self.assemble_from_connection(connection, executor_type)
        };
        let session = self.finish(assembled, auto_commit).await?;
        info!(executor_type = %executor_type, auto_commit, "Opened session on a supplied connection");
        Ok(session)
    }

    fn transaction_factory(&self) -> Arc<dyn TransactionFactory> {
        match self.configuration.environment() {
            Some(env) => Arc::clone(env.transaction_factory()),
            None => {
                debug!("No environment configured, using a managed transaction");
                Arc::new(ManagedTransactionFactory::default())
            }
        }
    }

    fn assemble_from_data_source(
        &self,
        options: &SessionOptions,
        executor_type: ExecutorType,
    ) -> Result<Box<dyn Executor>, Failed> {
        let data_source = self
            .configuration
            .environment()
            .map(|env| Arc::clone(env.data_source()));
        let transaction = self
            .transaction_factory()
            .new_transaction(data_source, options.isolation_level, options.auto_commit)
            .map_err(failed_without_executor)?;
        self.configuration
            .new_executor(transaction, executor_type)
            .map_err(failed_with_executor)
    }

    fn assemble_from_connection(
        &self,
        connection: Box<dyn Connection>,
        executor_type: ExecutorType,
    ) -> Result<Box<dyn Executor>, Failed> {
        let transaction = self
            .transaction_factory()
            .new_transaction_from_connection(connection)
            .map_err(failed_without_executor)?;
        self.configuration
            .new_executor(transaction, executor_type)
            .map_err(failed_with_executor)
    }

    /// Wrap the executor in a session, or close what was built and report the failure.
    async fn finish(
        &self,
        assembled: Result<Box<dyn Executor>, Failed>,
        auto_commit: bool,
    ) -> SqlMapResult<SqlSession> {
        match assembled {
            Ok(executor) => Ok(SqlSession::new(
                Arc::clone(&self.configuration),
                executor,
                auto_commit,
            )),
            Err(failed) => {
                if let Some(mut executor) = failed.executor {
                    // Executor close logs and swallows its own errors.
                    executor.close(true).await;
                }
                Err(SqlMapError::session_open(failed.context, failed.error))
            }
        }
    }
}

fn failed_without_executor(error: SqlMapError) -> Failed {
    Failed {
        error,
        context: ErrorContext::snapshot().describe(),
        executor: None,
    }
}

fn failed_with_executor(rejected: PluginRejected) -> Failed {
    Failed {
        error: rejected.error,
        context: ErrorContext::snapshot().describe(),
        executor: Some(rejected.executor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSource;
    use crate::io::FileResourceLoader;
    use crate::mapping::Environment;
    use crate::plugin::Interceptor;
    use crate::test_support::{CallLog, RecordingConnection, RecordingDataSource};
    use crate::transaction::JdbcTransactionFactory;

    struct Refuse;

    impl Interceptor for Refuse {
        fn plugin(&self, executor: Box<dyn Executor>) -> Result<Box<dyn Executor>, PluginRejected> {
            Err(PluginRejected::new(
                SqlMapError::component("Refuse", "no sessions today"),
                executor,
            ))
        }
    }

    fn configuration(log: &CallLog, with_environment: bool) -> Configuration {
        let mut config = Configuration::new(Arc::new(FileResourceLoader::default())).unwrap();
        if with_environment {
            let ds: Arc<dyn DataSource> = Arc::new(RecordingDataSource::new(log.clone()));
            config.set_environment(Environment::new(
                "test",
                Arc::new(JdbcTransactionFactory::default()),
                ds,
            ));
        }
        config
    }

    #[tokio::test]
    async fn test_no_environment_falls_back_to_managed_transaction() {
        let factory = SqlSessionFactory::new(configuration(&CallLog::default(), false));
        let mut session = factory.open_session().await.unwrap();
        assert!(!session.auto_commit());
        assert!(session.connection().await.is_err());
        session.close().await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_dirty_session_commits_and_clean_one_does_not() {
        let log = CallLog::default();
        let factory = SqlSessionFactory::new(configuration(&log, true));
        let mut session = factory.open_session().await.unwrap();

        session.commit(false).await.unwrap();
        assert_eq!(log.count("commit"), 0);

        session.update("UPDATE blog SET title = 'x'").await.unwrap();
        assert!(session.is_dirty());
        session.commit(false).await.unwrap();
        assert_eq!(log.count("commit"), 1);
        assert!(!session.is_dirty());
        session.close().await;
    }

    #[tokio::test]
    async fn test_close_rolls_back_uncommitted_work() {
        let log = CallLog::default();
        let factory = SqlSessionFactory::new(configuration(&log, true));
        let mut session = factory
            .open_session_with(SessionOptions::default().executor_type(ExecutorType::Reuse))
            .await
            .unwrap();
        assert_eq!(session.executor().executor_type(), ExecutorType::Reuse);
        session.delete("DELETE FROM blog").await.unwrap();
        session.close().await;
        assert_eq!(log.count("rollback"), 1);
        assert_eq!(log.count("close"), 1);
    }

    #[tokio::test]
    async fn test_auto_commit_session_never_commits() {
        let log = CallLog::default();
        let factory = SqlSessionFactory::new(configuration(&log, true));
        let mut session = factory
            .open_session_with(SessionOptions::default().auto_commit(true))
            .await
            .unwrap();
        session.insert("INSERT INTO blog VALUES (1)").await.unwrap();
        session.commit(false).await.unwrap();
        session.close().await;
        assert_eq!(log.count("commit"), 0);
        assert_eq!(log.count("rollback"), 0);
    }

    #[tokio::test]
    async fn test_refused_executor_is_closed_and_error_wrapped() {
        let log = CallLog::default();
        let mut config = configuration(&log, true);
        config.add_interceptor(Arc::new(Refuse));
        let factory = SqlSessionFactory::new(config);

        let conn = Box::new(RecordingConnection::new(log.clone()));
        let err = factory
            .open_session_with_connection(conn, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapError::SessionOpen { .. }));
        assert!(err.to_string().contains("SqlSessionFactory"));
        assert!(matches!(err.cause(), SqlMapError::Component { .. }));
        assert_eq!(log.count("close"), 1);
        assert!(ErrorContext::snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_connection_session_reads_auto_commit_from_connection() {
        let log = CallLog::default();
        let factory = SqlSessionFactory::new(configuration(&log, true));

        let mut conn = RecordingConnection::new(log.clone());
        conn.auto_commit = false;
        let session = factory
            .open_session_with_connection(Box::new(conn), Some(ExecutorType::Batch))
            .await
            .unwrap();
        assert!(!session.auto_commit());

        let mut conn = RecordingConnection::new(log.clone());
        conn.fail_auto_commit_query = true;
        let mut session = factory
            .open_session_with_connection(Box::new(conn), None)
            .await
            .unwrap();
        assert!(session.auto_commit());
        assert!(session.connection().await.is_ok());
        assert_eq!(session.executor().executor_type(), ExecutorType::Simple);
        session.close().await;
    }
}
