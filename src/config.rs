//! Command-line configuration for the `sqlsession` binary.
//!
//! Every option can also be supplied through a `SQLSESSION_*` environment variable.

use crate::parsing::Properties;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolve a declarative configuration tree and report what it produced.
#[derive(Parser, Debug, Clone)]
#[command(name = "sqlsession", version, about)]
pub struct Config {
    /// JSON file holding the `configuration` tree
    #[arg(short, long, value_name = "FILE", env = "SQLSESSION_CONFIG")]
    pub config: PathBuf,

    /// Environment to install instead of the tree's default
    #[arg(short, long, value_name = "ID", env = "SQLSESSION_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Override property, highest precedence. Can be specified multiple times;
    /// values are taken verbatim, commas included.
    #[arg(
        short = 'p',
        long = "property",
        value_name = "KEY=VALUE",
        env = "SQLSESSION_PROPERTY",
        value_parser = parse_property
    )]
    pub properties: Vec<(String, String)>,

    /// Directory that property and mapper resources are resolved against
    /// (default: the directory of the configuration file)
    #[arg(long, value_name = "DIR", env = "SQLSESSION_RESOURCE_ROOT")]
    pub resource_root: Option<PathBuf>,

    /// Open a session, acquire a connection, roll back and close it
    #[arg(long, env = "SQLSESSION_CHECK_CONNECTION")]
    pub check_connection: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SQLSESSION_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SQLSESSION_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to keep stdout clean for the summary)
    #[arg(long, env = "SQLSESSION_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Override properties as a property set; later duplicates win.
    pub fn overrides(&self) -> Properties {
        self.properties.iter().cloned().collect()
    }

    /// Root for relative resources.
    pub fn resource_root(&self) -> PathBuf {
        match &self.resource_root {
            Some(root) => root.clone(),
            None => self
                .config
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Parse a `key=value` override.
fn parse_property(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("url=sqlite::memory:").unwrap(),
            ("url".to_string(), "sqlite::memory:".to_string())
        );
        assert_eq!(parse_property("a=").unwrap(), ("a".to_string(), String::new()));
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }

    #[test]
    fn test_cli_overrides_and_defaults() {
        let config = Config::try_parse_from([
            "sqlsession",
            "--config",
            "conf/app.json",
            "-p",
            "a=1",
            "--property",
            "a=3",
            "--property",
            "b=2",
        ])
        .unwrap();
        let overrides = config.overrides();
        assert_eq!(overrides.get("a").map(String::as_str), Some("3"));
        assert_eq!(overrides.get("b").map(String::as_str), Some("2"));
        assert_eq!(config.resource_root(), PathBuf::from("conf"));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(!config.check_connection);
        assert!(config.environment.is_none());
    }

    #[test]
    fn test_property_values_keep_commas() {
        let config = Config::try_parse_from([
            "sqlsession",
            "--config",
            "app.json",
            "-p",
            "hosts=a,b",
            "-p",
            "c=d",
        ])
        .unwrap();
        let overrides = config.overrides();
        assert_eq!(overrides.get("hosts").map(String::as_str), Some("a,b"));
        assert_eq!(overrides.get("c").map(String::as_str), Some("d"));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn test_explicit_resource_root() {
        let config = Config::try_parse_from([
            "sqlsession",
            "--config",
            "app.json",
            "--resource-root",
            "/etc/app",
            "--environment",
            "prod",
        ])
        .unwrap();
        assert_eq!(config.resource_root(), PathBuf::from("/etc/app"));
        assert_eq!(config.environment.as_deref(), Some("prod"));
    }
}
