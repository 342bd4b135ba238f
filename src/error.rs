//! Error types for configuration resolution and session management.
//!
//! All failures are expressed through [`SqlMapError`]. Resolution and session-open
//! failures reach callers wrapped exactly once in [`SqlMapError::Resolution`] or
//! [`SqlMapError::SessionOpen`], with the originating error kept as the source.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlMapError {
    #[error("The alias '{alias}' is already mapped to the value '{existing}' (requested '{requested}')")]
    AliasConflict {
        alias: String,
        existing: String,
        requested: String,
    },

    #[error("Could not resolve type alias '{name}'")]
    UnresolvedType { name: String },

    #[error("Type '{type_name}' cannot be used as {expected}")]
    TypeMismatch { type_name: String, expected: String },

    #[error("The setting {key} is not known. Make sure you spelled it correctly (case sensitive).")]
    UnknownSetting { key: String },

    #[error("Invalid value '{value}' for setting {key}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    #[error(
        "The properties element cannot specify both a URL and a resource based property file reference. Please specify one or the other."
    )]
    AmbiguousPropertySource,

    #[error("A mapper element may only specify a url, resource or class, but not more than one.")]
    AmbiguousMapperSource,

    #[error("No environment specified.")]
    NoEnvironmentSelected,

    #[error("Environment requires an id attribute.")]
    EnvironmentIdMissing,

    #[error("{parent} declaration requires a {element} element")]
    MissingElement { parent: String, element: String },

    #[error("Element '{element}' requires a '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("{what} '{key}' is already registered")]
    AlreadyRegistered { what: String, key: String },

    #[error("Cache instances require an ID.")]
    CacheMisconfigured,

    #[error("Each configuration builder can only be used once.")]
    AlreadyResolved,

    #[error("Could not load resource '{resource}': {message}")]
    Resource { resource: String, message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Transaction error: {message}")]
    Transaction { message: String },

    #[error("{component} failed: {message}")]
    Component { component: String, message: String },

    #[error("Error building configuration{context}. Cause: {source}")]
    Resolution {
        context: String,
        #[source]
        source: Box<SqlMapError>,
    },

    #[error("Error opening session{context}. Cause: {source}")]
    SessionOpen {
        context: String,
        #[source]
        source: Box<SqlMapError>,
    },
}

impl SqlMapError {
    /// Create an alias conflict error.
    pub fn alias_conflict(
        alias: impl Into<String>,
        existing: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::AliasConflict {
            alias: alias.into(),
            existing: existing.into(),
            requested: requested.into(),
        }
    }

    /// Create an unresolved type error.
    pub fn unresolved_type(name: impl Into<String>) -> Self {
        Self::UnresolvedType { name: name.into() }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(type_name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            type_name: type_name.into(),
            expected: expected.into(),
        }
    }

    /// Create an unknown setting error.
    pub fn unknown_setting(key: impl Into<String>) -> Self {
        Self::UnknownSetting { key: key.into() }
    }

    /// Create an invalid setting value error.
    pub fn invalid_setting(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing element error.
    pub fn missing_element(parent: impl Into<String>, element: impl Into<String>) -> Self {
        Self::MissingElement {
            parent: parent.into(),
            element: element.into(),
        }
    }

    /// Create a missing attribute error.
    pub fn missing_attribute(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Create a duplicate registration error.
    pub fn already_registered(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            what: what.into(),
            key: key.into(),
        }
    }

    /// Create a resource loading error.
    pub fn resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create an error reported by a plugged-in component.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Wrap a failure raised while resolving a configuration tree.
    pub fn resolution(context: impl Into<String>, source: SqlMapError) -> Self {
        Self::Resolution {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure raised while assembling a session.
    pub fn session_open(context: impl Into<String>, source: SqlMapError) -> Self {
        Self::SessionOpen {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The originating error, looking through boundary wrappers.
    pub fn cause(&self) -> &SqlMapError {
        match self {
            Self::Resolution { source, .. } | Self::SessionOpen { source, .. } => source.cause(),
            other => other,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self.cause() {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Convert sqlx errors to SqlMapError.
impl From<sqlx::Error> for SqlMapError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => SqlMapError::connection(
                msg.to_string(),
                "Check the connection url format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                SqlMapError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::PoolTimedOut => SqlMapError::connection(
                "Timed out acquiring a pooled connection",
                "Increase acquireTimeout or maxConnections on the data source",
            ),
            sqlx::Error::PoolClosed => {
                SqlMapError::connection("Connection pool is closed", "Rebuild the data source")
            }
            sqlx::Error::Io(io_err) => SqlMapError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => SqlMapError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => SqlMapError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::AnyDriverError(err) => SqlMapError::connection(
                format!("Driver error: {}", err),
                "Check that the url scheme names a supported driver",
            ),
            sqlx::Error::WorkerCrashed => {
                SqlMapError::connection("Database worker crashed", "Reopen the connection")
            }
            _ => SqlMapError::database(
                format!("Unknown database error: {}", err),
                None,
                "Inspect the database logs",
            ),
        }
    }
}

/// Result type alias for configuration and session operations.
pub type SqlMapResult<T> = Result<T, SqlMapError>;
