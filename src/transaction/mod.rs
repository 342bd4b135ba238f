//! Units of work over one connection.
//!
//! A [`Transaction`] acquires its connection lazily, commits or rolls it back, and
//! releases it on close:
//!
//! ```text
//! Unopened -> Open -> (Committed | RolledBack)* -> Closed
//! ```
//!
//! - [`JdbcTransaction`]: drives commit and rollback on the connection itself
//! - [`ManagedTransaction`]: leaves the unit of work to an outer container

pub mod jdbc;
pub mod managed;

pub use jdbc::{JdbcTransaction, JdbcTransactionFactory};
pub use managed::{ManagedTransaction, ManagedTransactionFactory};

use crate::datasource::{Connection, DataSource, IsolationLevel};
use crate::error::SqlMapResult;
use crate::parsing::Properties;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Unopened,
    Open,
    Committed,
    RolledBack,
    Closed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[async_trait]
pub trait Transaction: Send + fmt::Debug {
    /// Label used in logs.
    fn id(&self) -> &str;

    /// The connection, opened on first use.
    async fn connection(&mut self) -> SqlMapResult<&mut dyn Connection>;

    async fn commit(&mut self) -> SqlMapResult<()>;

    async fn rollback(&mut self) -> SqlMapResult<()>;

    /// Release the connection. Closing twice is a no-op.
    async fn close(&mut self) -> SqlMapResult<()>;

    /// Statement timeout imposed by the transaction, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn state(&self) -> TransactionState;
}

/// Creates transactions for an environment.
pub trait TransactionFactory: Send + Sync {
    fn set_properties(&mut self, _properties: &Properties) -> SqlMapResult<()> {
        Ok(())
    }

    /// Transaction that opens its connection from `data_source` on first use.
    fn new_transaction(
        &self,
        data_source: Option<Arc<dyn DataSource>>,
        level: Option<IsolationLevel>,
        auto_commit: bool,
    ) -> SqlMapResult<Box<dyn Transaction>>;

    /// Transaction over a connection the caller already holds.
    fn new_transaction_from_connection(
        &self,
        connection: Box<dyn Connection>,
    ) -> SqlMapResult<Box<dyn Transaction>>;
}

/// Generate a transaction label.
pub(crate) fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_transaction_id() {
        let id1 = generate_transaction_id();
        let id2 = generate_transaction_id();
        assert!(id1.starts_with("tx_"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled_back");
        assert_eq!(
            serde_json::to_string(&TransactionState::Unopened).unwrap(),
            "\"unopened\""
        );
    }
}
