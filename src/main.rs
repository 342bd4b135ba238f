//! sqlsession - resolve a declarative data-access configuration.
//!
//! Reads a JSON `configuration` tree, resolves it, prints a JSON summary of the result
//! and optionally checks that a session can reach the configured data source.

use clap::Parser;
use sqlsession::builder::ConfigBuilder;
use sqlsession::config::Config;
use sqlsession::io::{FileResourceLoader, ResourceLoader};
use sqlsession::parsing::Node;
use sqlsession::session::{SessionOptions, SqlSessionFactory};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

/// Acquire a connection through a fresh session and give it back untouched.
async fn check_connection(factory: &SqlSessionFactory) -> Result<(), Box<dyn std::error::Error>> {
    if factory.configuration().environment().is_none() {
        return Err("no environment is installed, nothing to connect to".into());
    }
    let mut session = factory.open_session_with(SessionOptions::default()).await?;
    let acquired = session.connection().await.map(|_| ());
    let result = match acquired {
        Ok(()) => session.rollback(true).await,
        Err(e) => Err(e),
    };
    session.close().await;
    result?;
    info!("Connection check succeeded");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    if config.enable_logs {
        init_tracing(&config);
    }

    let loader = FileResourceLoader::new(config.resource_root());
    let config_path = config.config.to_string_lossy().to_string();
    let document = std::fs::read(&config.config)
        .map_err(|e| format!("Could not read {}: {}", config_path, e))?;
    let tree = Node::from_json_slice(&document)?;

    let mut builder = ConfigBuilder::new(tree)
        .with_resource_name(config_path)
        .with_properties(config.overrides())
        .with_resource_loader(Arc::new(loader) as Arc<dyn ResourceLoader>);
    if let Some(environment) = &config.environment {
        builder = builder.with_environment(environment);
    }

    let factory = match builder.build_factory() {
        Ok(factory) => factory,
        Err(e) => {
            error!(error = %e, "Configuration failed");
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            return Err(e.into());
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&factory.configuration().summary())?
    );

    if config.check_connection {
        if let Err(e) = check_connection(&factory).await {
            error!(error = %e, "Connection check failed");
            return Err(e);
        }
    }

    if let Some(env) = factory.configuration().environment() {
        env.data_source().close().await;
    }
    Ok(())
}
