//! sqlsession
//!
//! Resolves a declarative, hierarchical data-access configuration into one runtime
//! [`Configuration`] and opens transactional sessions against it over SQLite, PostgreSQL
//! or MySQL.
//!
//! ```no_run
//! use sqlsession::builder::ConfigBuilder;
//! use sqlsession::parsing::Node;
//!
//! # async fn run() -> sqlsession::SqlMapResult<()> {
//! let tree = Node::new("configuration").child(
//!     Node::new("environments").attr("default", "dev").child(
//!         Node::new("environment")
//!             .attr("id", "dev")
//!             .child(Node::new("transactionManager").attr("type", "JDBC"))
//!             .child(Node::new("dataSource").attr("type", "POOLED").property("url", "sqlite::memory:")),
//!     ),
//! );
//! let factory = ConfigBuilder::new(tree).build_factory()?;
//! let mut session = factory.open_session().await?;
//! session.update("CREATE TABLE blog (id INTEGER PRIMARY KEY)").await?;
//! session.commit(false).await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod macros;

pub mod builder;
pub mod cache;
pub mod config;
pub mod datasource;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod io;
pub mod logging;
pub mod mapping;
pub mod parsing;
pub mod plugin;
pub mod reflection;
pub mod session;
pub mod transaction;
pub mod types;

#[cfg(test)]
mod test_support;

pub use builder::ConfigBuilder;
pub use config::Config;
pub use error::{SqlMapError, SqlMapResult};
pub use session::{Configuration, SessionOptions, SqlSession, SqlSessionFactory};
