//! Environments, mapper registration and mapping documents.

pub mod environment;
pub mod fragments;
pub mod language;
pub mod parser;
pub mod registry;
pub mod vendor;

pub use environment::Environment;
pub use fragments::SqlFragments;
pub use parser::{MapperDocumentParser, NodeMapperParser};
pub use registry::MapperRegistry;
pub use vendor::{DatabaseIdProvider, VendorDatabaseIdProvider};

use serde::Serialize;

string_enum! {
    /// Kind of a declared statement.
    pub enum SqlCommandType {
        Select => "SELECT",
        Insert => "INSERT",
        Update => "UPDATE",
        Delete => "DELETE",
    }
}

impl SqlCommandType {
    /// Command type for a mapper element name (`select`, `insert`, ...).
    pub fn from_element(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

/// A statement declared in a mapping document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedStatement {
    /// `namespace.id`
    pub id: String,
    pub command_type: SqlCommandType,
    pub sql: String,
    /// Document the statement was read from.
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    /// Language driver type name.
    pub lang: String,
}

/// A statement whose `include` references could not be resolved yet.
#[derive(Debug, Clone)]
pub struct PendingStatement {
    pub namespace: String,
    pub resource: String,
    pub element: crate::parsing::Node,
    /// The fragment id that was missing at the last attempt.
    pub missing: String,
}
