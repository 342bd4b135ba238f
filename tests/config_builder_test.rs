//! Integration tests for resolving configuration trees read from JSON files.
//!
//! Tests verify that:
//! - Property sources overlay in order inline < file < overrides
//! - Resolution of the same input is deterministic
//! - A builder resolves exactly once
//! - Environment selection honours the default and an explicit id
//! - Fragments declared in one mapper document are usable from another
//! - Failures carry the originating cause and the context they happened in

use serde_json::json;
use sqlsession::builder::ConfigBuilder;
use sqlsession::io::FileResourceLoader;
use sqlsession::parsing::{Node, Properties};
use sqlsession::session::Configuration;
use sqlsession::SqlMapError;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

fn application_tree() -> serde_json::Value {
    json!({
        "name": "configuration",
        "children": [
            { "name": "properties", "attributes": { "resource": "app.properties" },
              "children": [
                { "name": "property", "attributes": { "name": "a", "value": "1" } },
                { "name": "property", "attributes": { "name": "dev.url", "value": "sqlite::memory:" } }
              ] },
            { "name": "settings", "children": [
                { "name": "property", "attributes": { "name": "defaultExecutorType", "value": "${executor}" } },
                { "name": "property", "attributes": { "name": "localCacheScope", "value": "STATEMENT" } }
            ] },
            { "name": "environments", "attributes": { "default": "dev" }, "children": [
                { "name": "environment", "attributes": { "id": "dev" }, "children": [
                    { "name": "transactionManager", "attributes": { "type": "JDBC" } },
                    { "name": "dataSource", "attributes": { "type": "POOLED" }, "children": [
                        { "name": "property", "attributes": { "name": "url", "value": "${dev.url}" } }
                    ] }
                ] },
                { "name": "environment", "attributes": { "id": "prod" }, "children": [
                    { "name": "transactionManager", "attributes": { "type": "MANAGED" }, "children": [
                        { "name": "property", "attributes": { "name": "closeConnection", "value": "false" } }
                    ] },
                    { "name": "dataSource", "attributes": { "type": "UNPOOLED" }, "children": [
                        { "name": "property", "attributes": { "name": "url", "value": "postgres://app@db/app" } }
                    ] }
                ] }
            ] },
            { "name": "databaseIdProvider", "attributes": { "type": "DB_VENDOR" }, "children": [
                { "name": "property", "attributes": { "name": "SQLite", "value": "sqlite" } },
                { "name": "property", "attributes": { "name": "PostgreSQL", "value": "postgres" } }
            ] },
            { "name": "mappers", "children": [
                { "name": "mapper", "attributes": { "resource": "mappers/blog.json" } },
                { "name": "mapper", "attributes": { "resource": "mappers/common.json" } }
            ] }
        ]
    })
}

fn blog_mapper() -> serde_json::Value {
    json!({
        "name": "mapper",
        "attributes": { "namespace": "blog" },
        "children": [
            { "name": "cache" },
            { "name": "update", "attributes": { "id": "archive" }, "text": "UPDATE blog SET archived = 1 WHERE",
              "children": [ { "name": "include", "attributes": { "refid": "common.notArchived" } } ] },
            { "name": "delete", "attributes": { "id": "purge", "databaseId": "postgres" },
              "text": "DELETE FROM blog USING archive" },
            { "name": "delete", "attributes": { "id": "purge" }, "text": "DELETE FROM blog" }
        ]
    })
}

fn common_mapper() -> serde_json::Value {
    json!({
        "name": "mapper",
        "attributes": { "namespace": "common" },
        "children": [
            { "name": "sql", "attributes": { "id": "notArchived" }, "text": "archived = 0" }
        ]
    })
}

fn setup() -> (TempDir, Node) {
    let dir = TempDir::new().unwrap();
    write(&dir, "app.properties", "# application defaults\na=2\nexecutor=REUSE\n");
    fs::create_dir(dir.path().join("mappers")).unwrap();
    write(&dir, "mappers/blog.json", &blog_mapper().to_string());
    write(&dir, "mappers/common.json", &common_mapper().to_string());
    let tree = Node::from_json_str(&application_tree().to_string()).unwrap();
    (dir, tree)
}

fn builder(dir: &TempDir, tree: Node) -> ConfigBuilder {
    ConfigBuilder::new(tree)
        .with_resource_name("app.json")
        .with_resource_loader(Arc::new(FileResourceLoader::new(dir.path())))
}

fn resolve(dir: &TempDir, tree: Node) -> Configuration {
    builder(dir, tree).build().unwrap()
}

#[test]
fn test_override_wins_over_file_and_inline() {
    let (dir, tree) = setup();
    let mut overrides = Properties::new();
    overrides.insert("a".into(), "3".into());

    let config = builder(&dir, tree)
        .with_properties(overrides)
        .build()
        .unwrap();
    assert_eq!(config.variables().get("a").map(String::as_str), Some("3"));
    assert_eq!(
        config.variables().get("executor").map(String::as_str),
        Some("REUSE")
    );
}

#[test]
fn test_file_wins_over_inline() {
    let (dir, tree) = setup();
    let config = resolve(&dir, tree);
    assert_eq!(config.variables().get("a").map(String::as_str), Some("2"));
    assert_eq!(
        config.settings().default_executor_type.as_str(),
        "REUSE"
    );
}

#[test]
fn test_resolution_is_deterministic() {
    let (dir, tree) = setup();
    let first = serde_json::to_value(resolve(&dir, tree.clone()).summary()).unwrap();
    let second = serde_json::to_value(resolve(&dir, tree).summary()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_builder_is_single_use() {
    let (dir, tree) = setup();
    let mut builder = builder(&dir, tree);
    builder.build().unwrap();
    let err = builder.build().unwrap_err();
    assert!(matches!(err, SqlMapError::AlreadyResolved));
}

#[test]
fn test_default_environment_and_vendor_id() {
    let (dir, tree) = setup();
    let config = resolve(&dir, tree);
    let env = config.environment().unwrap();
    assert_eq!(env.id(), "dev");
    assert_eq!(env.data_source().product_name(), "SQLite");
    assert_eq!(config.database_id(), Some("sqlite"));
    assert_eq!(
        config.mapped_statement("blog.purge").unwrap().sql,
        "DELETE FROM blog"
    );
}

#[test]
fn test_explicit_environment_changes_statement_choice() {
    let (dir, tree) = setup();
    let config = builder(&dir, tree)
        .with_environment("prod")
        .build()
        .unwrap();
    assert_eq!(config.environment().unwrap().id(), "prod");
    assert_eq!(config.database_id(), Some("postgres"));
    let purge = config.mapped_statement("blog.purge").unwrap();
    assert_eq!(purge.sql, "DELETE FROM blog USING archive");
    assert_eq!(purge.database_id.as_deref(), Some("postgres"));
}

#[test]
fn test_fragments_resolve_across_documents() {
    let (dir, tree) = setup();
    let config = resolve(&dir, tree);
    assert_eq!(
        config.mapped_statement("blog.archive").unwrap().sql,
        "UPDATE blog SET archived = 1 WHERE archived = 0"
    );
    assert!(config.incomplete_statements().is_empty());
    assert!(config.cache("blog").is_some());

    let summary = config.summary();
    assert_eq!(summary.namespaces, vec!["blog", "common"]);
    assert_eq!(
        summary.loaded_resources,
        vec!["mappers/blog.json", "mappers/common.json"]
    );
}

#[test]
fn test_summary_hides_variable_values() {
    let (dir, tree) = setup();
    let summary = serde_json::to_value(resolve(&dir, tree).summary()).unwrap();
    let variables = summary["variables"].as_array().unwrap();
    assert!(variables.iter().any(|v| v == "dev.url"));
    assert!(!summary.to_string().contains("sqlite::memory:"));
    assert_eq!(summary["settings"]["localCacheScope"], "STATEMENT");
    assert_eq!(summary["environment"]["id"], "dev");
}

#[test]
fn test_missing_properties_file_is_wrapped_with_context() {
    let dir = TempDir::new().unwrap();
    let (_, tree) = setup();
    let err = builder(&dir, tree).build().unwrap_err();

    assert!(matches!(err, SqlMapError::Resolution { .. }));
    assert!(matches!(err.cause(), SqlMapError::Resource { resource, .. } if resource == "app.properties"));
    let message = err.to_string();
    assert!(message.contains("the error may exist in app.json"));
    assert!(message.contains("reading properties"));
}

#[test]
fn test_mapper_with_resource_and_class_is_rejected() {
    let (dir, mut tree) = setup();
    let mappers = tree
        .children
        .iter_mut()
        .find(|c| c.name == "mappers")
        .unwrap();
    mappers.children.push(
        Node::new("mapper")
            .attr("resource", "mappers/blog.json")
            .attr("class", "app::BlogMapper"),
    );

    let err = builder(&dir, tree).build().unwrap_err();
    assert!(matches!(err.cause(), SqlMapError::AmbiguousMapperSource));
}
