use super::{Transaction, TransactionFactory, TransactionState, generate_transaction_id};
use crate::datasource::{Connection, DataSource, IsolationLevel};
use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::{Properties, parse_flag};
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Transaction whose unit of work is owned by an outer container.
///
/// `commit` and `rollback` are ignored. `close` releases the connection unless the
/// factory was configured with `closeConnection=false`.
pub struct ManagedTransaction {
    id: String,
    data_source: Option<Arc<dyn DataSource>>,
    connection: Option<Box<dyn Connection>>,
    level: Option<IsolationLevel>,
    close_connection: bool,
    state: TransactionState,
}

impl ManagedTransaction {
    pub fn new(
        data_source: Option<Arc<dyn DataSource>>,
        level: Option<IsolationLevel>,
        close_connection: bool,
    ) -> Self {
        Self {
            id: generate_transaction_id(),
            data_source,
            connection: None,
            level,
            close_connection,
            state: TransactionState::Unopened,
        }
    }

    pub fn from_connection(connection: Box<dyn Connection>, close_connection: bool) -> Self {
        Self {
            id: generate_transaction_id(),
            data_source: None,
            connection: Some(connection),
            level: None,
            close_connection,
            state: TransactionState::Open,
        }
    }

    pub fn has_data_source(&self) -> bool {
        self.data_source.is_some()
    }
}

#[async_trait]
impl Transaction for ManagedTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connection(&mut self) -> SqlMapResult<&mut dyn Connection> {
        if self.connection.is_none() {
            if self.state == TransactionState::Closed {
                return Err(SqlMapError::transaction(format!(
                    "Transaction {} is closed",
                    self.id
                )));
            }
            let data_source = self.data_source.as_ref().ok_or_else(|| {
                SqlMapError::transaction("No data source is configured for this transaction")
            })?;
            debug!(transaction_id = %self.id, "Opening managed connection");
            let mut connection = data_source.connection().await?;
            if let Some(level) = self.level {
                connection.set_isolation_level(level).await?;
            }
            self.connection = Some(connection);
            self.state = TransactionState::Open;
        }
        let connection: &mut dyn Connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| SqlMapError::transaction("Connection is not available"))?;
        Ok(connection)
    }

    async fn commit(&mut self) -> SqlMapResult<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> SqlMapResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> SqlMapResult<()> {
        if self.state == TransactionState::Closed {
            return Ok(());
        }
        self.state = TransactionState::Closed;
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        if self.close_connection {
            debug!(transaction_id = %self.id, "Closing managed connection");
            connection.close().await
        } else {
            // Ownership goes back to the container; dropping releases our handle only.
            drop(connection);
            Ok(())
        }
    }

    fn state(&self) -> TransactionState {
        self.state
    }
}

impl fmt::Debug for ManagedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTransaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("close_connection", &self.close_connection)
            .field("has_data_source", &self.data_source.is_some())
            .finish()
    }
}

/// Factory registered as `MANAGED`; also the fallback when no environment is configured.
#[derive(Debug)]
pub struct ManagedTransactionFactory {
    close_connection: bool,
}

impl Default for ManagedTransactionFactory {
    fn default() -> Self {
        Self {
            close_connection: true,
        }
    }
}

impl ManagedTransactionFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::transaction::ManagedTransactionFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::TransactionFactory)
            .with_constructor(Constructor::TransactionFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn TransactionFactory> {
        Box::new(Self::default())
    }
}

impl TransactionFactory for ManagedTransactionFactory {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        if let Some(value) = properties.get("closeConnection") {
            self.close_connection = parse_flag("closeConnection", value)?;
        }
        Ok(())
    }

    fn new_transaction(
        &self,
        data_source: Option<Arc<dyn DataSource>>,
        level: Option<IsolationLevel>,
        _auto_commit: bool,
    ) -> SqlMapResult<Box<dyn Transaction>> {
        Ok(Box::new(ManagedTransaction::new(
            data_source,
            level,
            self.close_connection,
        )))
    }

    fn new_transaction_from_connection(
        &self,
        connection: Box<dyn Connection>,
    ) -> SqlMapResult<Box<dyn Transaction>> {
        Ok(Box::new(ManagedTransaction::from_connection(
            connection,
            self.close_connection,
        )))
    }
}
