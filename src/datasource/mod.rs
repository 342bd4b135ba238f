//! Data sources and connections.
//!
//! This module exposes connections through the [`Connection`] trait so transactions can
//! drive auto-commit, isolation and commit/rollback without knowing the driver:
//!
//! - [`SqlxConnection`]: a pooled or direct `sqlx` connection using the `Any` driver
//! - [`PooledDataSource`]: lazily created `sqlx` pool shared by all sessions
//! - [`UnpooledDataSource`]: a fresh connection per request

pub mod connection;
pub mod options;
pub mod pooled;
pub mod unpooled;

pub use connection::SqlxConnection;
pub use options::DataSourceOptions;
pub use pooled::{PooledDataSource, PooledDataSourceFactory};
pub use unpooled::{UnpooledDataSource, UnpooledDataSourceFactory};

use crate::error::SqlMapResult;
use crate::parsing::Properties;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Product name reported to database id providers.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

string_enum! {
    /// Transaction isolation level.
    pub enum IsolationLevel {
        None => "NONE",
        ReadUncommitted => "READ_UNCOMMITTED",
        ReadCommitted => "READ_COMMITTED",
        RepeatableRead => "REPEATABLE_READ",
        Serializable => "SERIALIZABLE",
    }
}

impl IsolationLevel {
    /// SQL spelling of the level, `None` for [`IsolationLevel::None`].
    pub fn sql_name(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ReadUncommitted => Some("READ UNCOMMITTED"),
            Self::ReadCommitted => Some("READ COMMITTED"),
            Self::RepeatableRead => Some("REPEATABLE READ"),
            Self::Serializable => Some("SERIALIZABLE"),
        }
    }
}

/// One open database connection.
///
/// Auto-commit is on for a freshly opened connection. Turning it off starts an explicit
/// unit of work that stays open across `commit` and `rollback`.
#[async_trait]
pub trait Connection: Send + fmt::Debug {
    /// Current auto-commit disposition.
    fn auto_commit(&self) -> SqlMapResult<bool>;

    async fn set_auto_commit(&mut self, auto_commit: bool) -> SqlMapResult<()>;

    async fn set_isolation_level(&mut self, level: IsolationLevel) -> SqlMapResult<()>;

    async fn commit(&mut self) -> SqlMapResult<()>;

    async fn rollback(&mut self) -> SqlMapResult<()>;

    /// Run raw SQL and return the number of affected rows.
    async fn execute(&mut self, sql: &str) -> SqlMapResult<u64>;

    /// Release the connection (back to its pool, or physically).
    async fn close(self: Box<Self>) -> SqlMapResult<()>;

    /// Backend of this connection.
    fn database_type(&self) -> DatabaseType;
}

/// Source of connections for an environment.
#[async_trait]
pub trait DataSource: Send + Sync + fmt::Debug {
    async fn connection(&self) -> SqlMapResult<Box<dyn Connection>>;

    fn database_type(&self) -> DatabaseType;

    /// Database product name, e.g. "PostgreSQL".
    fn product_name(&self) -> &'static str {
        self.database_type().display_name()
    }

    /// Release pooled resources. Later requests may reopen them.
    async fn close(&self) {}
}

/// Builds a data source from declarative properties.
pub trait DataSourceFactory: Send + Sync {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()>;

    fn data_source(&self) -> SqlMapResult<Arc<dyn DataSource>>;
}
