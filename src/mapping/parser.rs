//! Mapping document parsing.
//!
//! The default [`NodeMapperParser`] reads the JSON form of a mapper tree:
//!
//! ```json
//! { "name": "mapper", "attributes": { "namespace": "blog" },
//!   "children": [
//!     { "name": "cache" },
//!     { "name": "sql", "attributes": { "id": "columns" }, "text": "id, title" },
//!     { "name": "select", "attributes": { "id": "selectAll" }, "text": "SELECT",
//!       "children": [ { "name": "include", "attributes": { "refid": "columns" } },
//!                     { "name": "text", "text": "FROM blog" } ] } ] }
//! ```

use super::language::{self, XmlLanguageDriver};
use super::{MappedStatement, PendingStatement, SqlCommandType, SqlFragments};
use crate::diagnostics::ErrorContext;
use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::Node;
use crate::session::Configuration;
use crate::types::TypeKind;
use std::sync::Arc;
use tracing::debug;

const MAX_INCLUDE_DEPTH: usize = 16;
const DEFAULT_CACHE_TYPE: &str = "PERPETUAL";

/// Reads one mapping document into a configuration.
pub trait MapperDocumentParser: Send + Sync {
    /// Parse `document`, loaded from `resource`, registering what it declares on
    /// `configuration`. `fragments` is shared by every document of the configuration.
    fn parse(
        &self,
        document: &[u8],
        configuration: &mut Configuration,
        resource: &str,
        fragments: &SqlFragments,
    ) -> SqlMapResult<()>;
}

/// Default parser for JSON mapper trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeMapperParser;

enum AssembledSql {
    Complete(String),
    /// Id of the first fragment that is not declared yet.
    Missing(String),
}

impl MapperDocumentParser for NodeMapperParser {
    fn parse(
        &self,
        document: &[u8],
        configuration: &mut Configuration,
        resource: &str,
        fragments: &SqlFragments,
    ) -> SqlMapResult<()> {
        if configuration.is_resource_loaded(resource) {
            debug!(resource = %resource, "Mapping document already loaded");
            return Ok(());
        }
        let root: Node = serde_json::from_slice(document)
            .map_err(|e| SqlMapError::resource(resource, e.to_string()))?;
        let root = root.with_variables(configuration.variables());
        if root.name != "mapper" {
            return Err(SqlMapError::missing_element(resource, "mapper"));
        }
        let namespace = root.required_attribute("namespace")?;
        if namespace.is_empty() {
            return Err(SqlMapError::missing_attribute("mapper", "namespace"));
        }
        ErrorContext::set_activity(format!("parsing mapper namespace {}", namespace));

        configuration.add_loaded_resource(resource);
        configuration.add_namespace(namespace);

        if let Some(cache) = root.child_named("cache") {
            self.cache_element(configuration, namespace, cache)?;
        }
        for sql in root.children_named("sql") {
            if !database_id_matches(configuration, sql) {
                continue;
            }
            let id = qualify(namespace, sql.required_attribute("id")?);
            debug!(fragment = %id, "Registered SQL fragment");
            fragments.insert(id, sql.clone());
        }
        for element in &root.children {
            if SqlCommandType::from_element(&element.name).is_some() {
                self.statement_element(configuration, namespace, resource, element, fragments)?;
            }
        }
        self.retry_pending(configuration, fragments)
    }
}

impl NodeMapperParser {
    fn cache_element(
        &self,
        configuration: &mut Configuration,
        namespace: &str,
        element: &Node,
    ) -> SqlMapResult<()> {
        let type_name = element.attribute("type").unwrap_or(DEFAULT_CACHE_TYPE);
        let ty = configuration.alias_registry().resolve_alias(type_name)?;
        let cache = ty.instantiate_cache(namespace)?;
        configuration.add_cache(Arc::from(cache))
    }

    fn statement_element(
        &self,
        configuration: &mut Configuration,
        namespace: &str,
        resource: &str,
        element: &Node,
        fragments: &SqlFragments,
    ) -> SqlMapResult<()> {
        if !database_id_matches(configuration, element) {
            debug!(
                element = %element.name,
                id = ?element.attribute("id"),
                "Skipping statement for another database"
            );
            return Ok(());
        }
        match self.build_statement(configuration, namespace, resource, element, fragments)? {
            Some(statement) => configuration.add_mapped_statement(statement),
            None => Ok(()),
        }
    }

    /// Build the statement, or park it as pending when an include is unresolved.
    fn build_statement(
        &self,
        configuration: &mut Configuration,
        namespace: &str,
        resource: &str,
        element: &Node,
        fragments: &SqlFragments,
    ) -> SqlMapResult<Option<MappedStatement>> {
        let id = qualify(namespace, element.required_attribute("id")?);
        ErrorContext::set_object(id.clone());
        let command_type = SqlCommandType::from_element(&element.name)
            .ok_or_else(|| SqlMapError::missing_element(&id, "select|insert|update|delete"))?;

        let lang = match element.attribute("lang") {
            Some(name) => {
                let ty = configuration.alias_registry().resolve_alias(name)?;
                if !ty.is_assignable_to(TypeKind::LanguageDriver) {
                    return Err(SqlMapError::type_mismatch(
                        ty.name(),
                        TypeKind::LanguageDriver.describe(),
                    ));
                }
                ty.name().to_string()
            }
            None => configuration
                .settings()
                .default_scripting_language
                .clone()
                .unwrap_or_else(|| XmlLanguageDriver::TYPE_NAME.to_string()),
        };
        language::check_raw(&id, &lang, !element.children.is_empty())?;

        let sql = match assemble_sql(namespace, element, fragments, 0)? {
            AssembledSql::Complete(sql) => sql,
            AssembledSql::Missing(missing) => {
                debug!(statement = %id, fragment = %missing, "Statement waits for a fragment");
                configuration.add_incomplete_statement(PendingStatement {
                    namespace: namespace.to_string(),
                    resource: resource.to_string(),
                    element: element.clone(),
                    missing,
                });
                return Ok(None);
            }
        };
        let sql = if configuration.settings().shrink_whitespaces_in_sql {
            language::shrink_whitespace(&sql)
        } else {
            sql.trim().to_string()
        };

        Ok(Some(MappedStatement {
            id,
            command_type,
            sql,
            resource: resource.to_string(),
            database_id: element.attribute("databaseId").map(str::to_string),
            lang,
        }))
    }

    /// Retry every pending statement; the ones still missing a fragment stay pending.
    fn retry_pending(
        &self,
        configuration: &mut Configuration,
        fragments: &SqlFragments,
    ) -> SqlMapResult<()> {
        for pending in configuration.take_incomplete_statements() {
            if !fragments.contains(&pending.missing) {
                configuration.add_incomplete_statement(pending);
                continue;
            }
            self.statement_element(
                configuration,
                &pending.namespace,
                &pending.resource,
                &pending.element,
                fragments,
            )?;
        }
        Ok(())
    }
}

fn database_id_matches(configuration: &Configuration, element: &Node) -> bool {
    match element.attribute("databaseId") {
        Some(required) => configuration.database_id() == Some(required),
        None => true,
    }
}

/// `refid` as written, or prefixed with the current namespace when unqualified.
fn qualify(namespace: &str, id: &str) -> String {
    if id.contains('.') {
        id.to_string()
    } else {
        format!("{}.{}", namespace, id)
    }
}

fn assemble_sql(
    namespace: &str,
    element: &Node,
    fragments: &SqlFragments,
    depth: usize,
) -> SqlMapResult<AssembledSql> {
    let mut parts = Vec::new();
    if let Some(text) = &element.text {
        parts.push(text.trim().to_string());
    }
    for child in &element.children {
        match child.name.as_str() {
            "text" => parts.push(child.text.as_deref().unwrap_or_default().trim().to_string()),
            "include" => {
                let id = qualify(namespace, child.required_attribute("refid")?);
                let Some(fragment) = fragments.get(&id) else {
                    return Ok(AssembledSql::Missing(id));
                };
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(SqlMapError::component(
                        "include",
                        format!("Fragment '{}' is nested too deeply or includes itself", id),
                    ));
                }
                let fragment_namespace = id.rsplit_once('.').map_or(namespace, |(ns, _)| ns);
                match assemble_sql(fragment_namespace, &fragment, fragments, depth + 1)? {
                    AssembledSql::Complete(sql) => parts.push(sql),
                    missing => return Ok(missing),
                }
            }
            other => {
                return Err(SqlMapError::component(
                    "mapper",
                    format!("Unsupported element '{}' in '{}'", other, element.name),
                ));
            }
        }
    }
    parts.retain(|p| !p.is_empty());
    Ok(AssembledSql::Complete(parts.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::io::FileResourceLoader;
    use crate::mapping::language::RawLanguageDriver;

    fn configuration() -> Configuration {
        Configuration::new(Arc::new(FileResourceLoader::default())).unwrap()
    }

    fn parse(configuration: &mut Configuration, fragments: &SqlFragments, resource: &str, doc: Node) {
        let bytes = serde_json::to_vec(&doc).unwrap();
        NodeMapperParser
            .parse(&bytes, configuration, resource, fragments)
            .unwrap();
    }

    fn select(id: &str) -> Node {
        Node::new("select").attr("id", id)
    }

    #[test]
    fn test_statements_fragments_and_cache() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        let doc = Node::new("mapper")
            .attr("namespace", "blog")
            .child(Node::new("cache"))
            .child(Node::new("sql").attr("id", "columns").text("id, title"))
            .child(
                select("selectAll")
                    .text("SELECT")
                    .child(Node::new("include").attr("refid", "columns"))
                    .child(Node::new("text").text("FROM blog")),
            )
            .child(Node::new("delete").attr("id", "deleteAll").text("DELETE FROM blog"));
        parse(&mut config, &fragments, "blog.json", doc);

        let select_all = config.mapped_statement("blog.selectAll").unwrap();
        assert_eq!(select_all.sql, "SELECT id, title FROM blog");
        assert_eq!(select_all.command_type, SqlCommandType::Select);
        assert_eq!(select_all.lang, XmlLanguageDriver::TYPE_NAME);
        assert_eq!(
            config.mapped_statement("blog.deleteAll").unwrap().command_type,
            SqlCommandType::Delete
        );
        assert_eq!(config.cache("blog").unwrap().id(), "blog");
        assert!(config.is_resource_loaded("blog.json"));
    }

    #[test]
    fn test_cross_document_include_resolves_when_fragment_arrives() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        parse(
            &mut config,
            &fragments,
            "post.json",
            Node::new("mapper").attr("namespace", "post").child(
                select("count")
                    .text("SELECT COUNT(*) FROM")
                    .child(Node::new("include").attr("refid", "common.table")),
            ),
        );
        assert!(config.mapped_statement("post.count").is_none());
        assert_eq!(config.incomplete_statements().len(), 1);

        parse(
            &mut config,
            &fragments,
            "common.json",
            Node::new("mapper")
                .attr("namespace", "common")
                .child(Node::new("sql").attr("id", "table").text("post")),
        );
        assert!(config.incomplete_statements().is_empty());
        assert_eq!(
            config.mapped_statement("post.count").unwrap().sql,
            "SELECT COUNT(*) FROM post"
        );
    }

    #[test]
    fn test_same_resource_is_parsed_once() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        let doc = Node::new("mapper")
            .attr("namespace", "blog")
            .child(select("one").text("SELECT 1"));
        parse(&mut config, &fragments, "blog.json", doc.clone());
        parse(&mut config, &fragments, "blog.json", doc);
        assert_eq!(config.mapped_statements().count(), 1);
    }

    #[test]
    fn test_duplicate_statement_in_new_resource_fails() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        let doc = Node::new("mapper")
            .attr("namespace", "blog")
            .child(select("one").text("SELECT 1"));
        parse(&mut config, &fragments, "a.json", doc.clone());
        let bytes = serde_json::to_vec(&doc).unwrap();
        let err = NodeMapperParser
            .parse(&bytes, &mut config, "b.json", &fragments)
            .unwrap_err();
        assert!(matches!(err, SqlMapError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_database_specific_statement_wins() {
        let mut config = configuration();
        config.set_database_id(Some("SQLite".to_string()));
        let fragments = SqlFragments::new();
        parse(
            &mut config,
            &fragments,
            "blog.json",
            Node::new("mapper")
                .attr("namespace", "blog")
                .child(select("now").attr("databaseId", "SQLite").text("SELECT datetime('now')"))
                .child(select("now").text("SELECT CURRENT_TIMESTAMP"))
                .child(select("now").attr("databaseId", "PostgreSQL").text("SELECT now()")),
        );
        let statement = config.mapped_statement("blog.now").unwrap();
        assert_eq!(statement.sql, "SELECT datetime('now')");
        assert_eq!(statement.database_id.as_deref(), Some("SQLite"));
    }

    #[test]
    fn test_raw_language_rejects_includes() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        let doc = Node::new("mapper").attr("namespace", "blog").child(
            select("a")
                .attr("lang", "RAW")
                .child(Node::new("include").attr("refid", "x")),
        );
        let bytes = serde_json::to_vec(&doc).unwrap();
        let err = NodeMapperParser
            .parse(&bytes, &mut config, "blog.json", &fragments)
            .unwrap_err();
        assert!(err.to_string().contains(RawLanguageDriver::TYPE_NAME));
    }

    #[test]
    fn test_missing_namespace_and_bad_json() {
        let mut config = configuration();
        let fragments = SqlFragments::new();
        let bytes = serde_json::to_vec(&Node::new("mapper")).unwrap();
        assert!(matches!(
            NodeMapperParser
                .parse(&bytes, &mut config, "a.json", &fragments)
                .unwrap_err(),
            SqlMapError::MissingAttribute { .. }
        ));

        let err = NodeMapperParser
            .parse(b"{not json", &mut config, "b.json", &fragments)
            .unwrap_err();
        assert!(matches!(err, SqlMapError::Resource { ref resource, .. } if resource == "b.json"));
    }
}
