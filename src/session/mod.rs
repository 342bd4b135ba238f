//! Resolved configuration, sessions and the factory that opens them.

pub mod configuration;
pub mod factory;
pub mod settings;
pub mod sqlsession;

pub use configuration::{Configuration, ConfigurationSummary, EnvironmentSummary};
pub use factory::{SessionOptions, SqlSessionFactory};
pub use settings::Settings;
pub use sqlsession::SqlSession;
