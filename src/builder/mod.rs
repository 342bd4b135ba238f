//! Resolution of a declarative `configuration` tree into a [`Configuration`].
//!
//! Sections are read in a fixed order. Properties come first so that every later
//! section can use `${name}` placeholders, settings keys are validated before anything
//! else is installed, and mappers come last because they depend on aliases, the
//! environment and the database id.

use crate::datasource::DataSource;
use crate::diagnostics::ErrorContext;
use crate::error::{SqlMapError, SqlMapResult};
use crate::io::{FileResourceLoader, ResourceLoader};
use crate::logging;
use crate::mapping::{Environment, MapperDocumentParser, NodeMapperParser};
use crate::parsing::{Node, Properties};
use crate::session::{Configuration, Settings, SqlSessionFactory};
use crate::transaction::TransactionFactory;
use crate::types::{AliasRegistry, JdbcType, TypeCatalog, TypeKind};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Legacy alias accepted for the vendor database id provider.
const LEGACY_VENDOR_ALIAS: &str = "VENDOR";
const VENDOR_ALIAS: &str = "DB_VENDOR";

/// Single-use resolver for one declarative tree.
///
/// ```no_run
/// use sqlsession::builder::ConfigBuilder;
/// use sqlsession::parsing::Node;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let tree = Node::from_json_str(r#"{ "name": "configuration" }"#)?;
/// let configuration = ConfigBuilder::new(tree).with_environment("dev").build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigBuilder {
    root: Node,
    environment: Option<String>,
    overrides: Properties,
    resource_loader: Arc<dyn ResourceLoader>,
    mapper_parser: Arc<dyn MapperDocumentParser>,
    catalog: Option<TypeCatalog>,
    resource_name: String,
    parsed: bool,
}

impl ConfigBuilder {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            environment: None,
            overrides: Properties::new(),
            resource_loader: Arc::new(FileResourceLoader::default()),
            mapper_parser: Arc::new(NodeMapperParser),
            catalog: None,
            resource_name: "configuration".to_string(),
            parsed: false,
        }
    }

    /// Select this environment instead of the tree's `default` attribute.
    pub fn with_environment(mut self, id: impl Into<String>) -> Self {
        self.environment = Some(id.into());
        self
    }

    /// Properties that take precedence over inline and loaded ones.
    pub fn with_properties(mut self, overrides: Properties) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_resource_loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.resource_loader = loader;
        self
    }

    pub fn with_mapper_parser(mut self, parser: Arc<dyn MapperDocumentParser>) -> Self {
        self.mapper_parser = parser;
        self
    }

    /// Type catalog holding application types in addition to the built-ins.
    ///
    /// Start from [`TypeCatalog::with_builtins`] so the component aliases resolve.
    pub fn with_catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Name reported in error context for the tree itself.
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self
    }

    /// Resolve the tree.
    ///
    /// Can be called once; any later call fails with `AlreadyResolved`. Failures of the
    /// first call are wrapped in `Resolution` with the error context at the point of
    /// failure.
    pub fn build(&mut self) -> SqlMapResult<Configuration> {
        if self.parsed {
            return Err(SqlMapError::AlreadyResolved);
        }
        self.parsed = true;

        let _scope = ErrorContext::scope(self.resource_name.clone());
        let configuration = self
            .resolve()
            .map_err(|e| SqlMapError::resolution(ErrorContext::snapshot().describe(), e))?;
        if !logging::is_silenced(configuration.log_impl().map(|ty| ty.name())) {
            info!(
                resource = %self.resource_name,
                environment = ?configuration.environment().map(|env| env.id()),
                database_id = ?configuration.database_id(),
                mapped_statements = configuration.mapped_statements().count(),
                "Configuration resolved"
            );
        }
        Ok(configuration)
    }

    /// [`build`](Self::build) and wrap the result in a session factory.
    pub fn build_factory(&mut self) -> SqlMapResult<SqlSessionFactory> {
        self.build().map(SqlSessionFactory::new)
    }

    fn resolve(&mut self) -> SqlMapResult<Configuration> {
        if self.root.name != "configuration" {
            return Err(SqlMapError::missing_element(&self.resource_name, "configuration"));
        }
        let catalog = self.catalog.take().unwrap_or_else(TypeCatalog::with_builtins);
        let mut config = Configuration::with_aliases(
            AliasRegistry::new(catalog)?,
            Arc::clone(&self.resource_loader),
        )?;

        ErrorContext::set_activity("reading properties");
        let variables = self.properties_element(self.root.child_named("properties"))?;
        debug!(count = variables.len(), "Resolved variables");
        let root = self.root.with_variables(&variables);
        config.set_variables(variables);

        ErrorContext::set_activity("validating settings");
        let settings = root
            .child_named("settings")
            .map(Node::children_as_properties)
            .unwrap_or_default();
        Settings::validate_keys(&settings)?;

        ErrorContext::set_activity("installing vfs and log implementations");
        load_custom_vfs(&settings, &mut config)?;
        load_custom_log_impl(&settings, &mut config)?;

        ErrorContext::set_activity("registering type aliases");
        if let Some(node) = root.child_named("typeAliases") {
            type_aliases_element(node, &mut config)?;
        }

        ErrorContext::set_activity("installing plugins");
        if let Some(node) = root.child_named("plugins") {
            plugins_element(node, &mut config)?;
        }

        ErrorContext::set_activity("installing object factories");
        if let Some(node) = root.child_named("objectFactory") {
            object_factory_element(node, &mut config)?;
        }
        if let Some(node) = root.child_named("objectWrapperFactory") {
            object_wrapper_factory_element(node, &mut config)?;
        }
        if let Some(node) = root.child_named("reflectorFactory") {
            reflector_factory_element(node, &mut config)?;
        }

        ErrorContext::set_activity("applying settings");
        let typed = Settings::from_properties(&settings, config.alias_registry())?;
        debug!(
            cache_enabled = typed.cache_enabled,
            default_executor_type = %typed.default_executor_type,
            "Applied settings"
        );
        config.set_settings(typed);

        ErrorContext::set_activity("selecting the environment");
        if let Some(node) = root.child_named("environments") {
            self.environments_element(node, &mut config)?;
        }

        ErrorContext::set_activity("resolving the database id");
        if let Some(node) = root.child_named("databaseIdProvider") {
            database_id_provider_element(node, &mut config)?;
        }

        ErrorContext::set_activity("registering type handlers");
        if let Some(node) = root.child_named("typeHandlers") {
            type_handlers_element(node, &mut config)?;
        }

        ErrorContext::set_activity("loading mappers");
        if let Some(node) = root.child_named("mappers") {
            self.mappers_element(node, &mut config)?;
        }

        Ok(config)
    }

    /// Inline properties, overlaid by the resource or URL file, overlaid by overrides.
    fn properties_element(&self, node: Option<&Node>) -> SqlMapResult<Properties> {
        let mut variables = Properties::new();
        if let Some(node) = node {
            variables = node.children_as_properties();
            match (node.attribute("resource"), node.attribute("url")) {
                (Some(_), Some(_)) => return Err(SqlMapError::AmbiguousPropertySource),
                (Some(resource), None) => {
                    variables.extend(self.resource_loader.load_as_properties(resource)?);
                }
                (None, Some(url)) => {
                    variables.extend(self.resource_loader.load_url_as_properties(url)?);
                }
                (None, None) => {}
            }
        }
        variables.extend(self.overrides.clone());
        Ok(variables)
    }

    fn environments_element(&self, node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
        let selected = match &self.environment {
            Some(id) => id.clone(),
            None => node
                .attribute("default")
                .map(str::to_string)
                .ok_or(SqlMapError::NoEnvironmentSelected)?,
        };

        for candidate in node.children_named("environment") {
            let id = candidate
                .attribute("id")
                .ok_or(SqlMapError::EnvironmentIdMissing)?;
            if id != selected {
                continue;
            }
            ErrorContext::set_object(format!("environment '{}'", id));
            let transaction_factory = transaction_manager_element(
                candidate
                    .child_named("transactionManager")
                    .ok_or_else(|| SqlMapError::missing_element("Environment", "transactionManager"))?,
                config,
            )?;
            let data_source = data_source_element(
                candidate
                    .child_named("dataSource")
                    .ok_or_else(|| SqlMapError::missing_element("Environment", "dataSource"))?,
                config,
            )?;
            info!(
                environment = %id,
                database = %data_source.product_name(),
                "Installed environment"
            );
            config.set_environment(Environment::new(id, transaction_factory, data_source));
            return Ok(());
        }

        Err(SqlMapError::missing_element(
            "environments",
            format!("environment '{}'", selected),
        ))
    }

    fn mappers_element(&self, node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
        for child in &node.children {
            match child.name.as_str() {
                "package" => config.add_mappers(child.required_attribute("name")?)?,
                "mapper" => match (
                    child.attribute("resource"),
                    child.attribute("url"),
                    child.attribute("class"),
                ) {
                    (Some(resource), None, None) => {
                        ErrorContext::set_resource(resource);
                        let document = self.resource_loader.load_as_bytes(resource)?;
                        self.parse_mapper(&document, config, resource)?;
                    }
                    (None, Some(url), None) => {
                        ErrorContext::set_resource(url);
                        let document = self.resource_loader.load_url_as_bytes(url)?;
                        self.parse_mapper(&document, config, url)?;
                    }
                    (None, None, Some(class)) => {
                        let mapper = config.alias_registry().catalog().load(class)?;
                        config.add_mapper(mapper)?;
                    }
                    _ => return Err(SqlMapError::AmbiguousMapperSource),
                },
                other => debug!(element = %other, "Ignoring unknown mappers child"),
            }
        }
        Ok(())
    }

    fn parse_mapper(
        &self,
        document: &[u8],
        config: &mut Configuration,
        resource: &str,
    ) -> SqlMapResult<()> {
        let fragments = config.sql_fragments().clone();
        self.mapper_parser
            .parse(document, config, resource, &fragments)?;
        debug!(resource = %resource, "Loaded mapping document");
        Ok(())
    }
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("resource_name", &self.resource_name)
            .field("environment", &self.environment)
            .field("overrides", &self.overrides.len())
            .field("parsed", &self.parsed)
            .finish()
    }
}

/// Comma-separated `vfsImpl` entries, each registered once.
fn load_custom_vfs(settings: &Properties, config: &mut Configuration) -> SqlMapResult<()> {
    let Some(value) = settings.get("vfsImpl") else {
        return Ok(());
    };
    for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let vfs = config.alias_registry().resolve_alias(name)?;
        config.add_vfs_impl(vfs)?;
    }
    Ok(())
}

fn load_custom_log_impl(settings: &Properties, config: &mut Configuration) -> SqlMapResult<()> {
    let log_impl = config
        .alias_registry()
        .resolve_optional(settings.get("logImpl").map(String::as_str))?;
    config.set_log_impl(log_impl)
}

fn type_aliases_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    for child in &node.children {
        match child.name.as_str() {
            "package" => {
                let scope = child.required_attribute("name")?;
                config
                    .alias_registry_mut()
                    .register_aliases_from_scope(scope, TypeKind::Object)?;
            }
            "typeAlias" => {
                let ty = config
                    .alias_registry()
                    .catalog()
                    .load(child.required_attribute("type")?)?;
                match child.attribute("alias") {
                    Some(alias) => config.alias_registry_mut().register_alias(alias, ty)?,
                    None => config.alias_registry_mut().register_type(ty)?,
                }
            }
            other => debug!(element = %other, "Ignoring unknown typeAliases child"),
        }
    }
    Ok(())
}

fn plugins_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    for child in node.children_named("plugin") {
        let name = child.required_attribute("interceptor")?;
        ErrorContext::set_object(format!("interceptor '{}'", name));
        let mut interceptor = config
            .alias_registry()
            .resolve_alias(name)?
            .instantiate_interceptor()?;
        interceptor.set_properties(&child.children_as_properties())?;
        config.add_interceptor(Arc::from(interceptor));
        debug!(interceptor = %name, "Added interceptor");
    }
    Ok(())
}

fn object_factory_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    let mut factory = config
        .alias_registry()
        .resolve_alias(node.required_attribute("type")?)?
        .instantiate_object_factory()?;
    factory.set_properties(&node.children_as_properties())?;
    config.set_object_factory(Arc::from(factory));
    Ok(())
}

fn object_wrapper_factory_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    let factory = config
        .alias_registry()
        .resolve_alias(node.required_attribute("type")?)?
        .instantiate_object_wrapper_factory()?;
    config.set_object_wrapper_factory(Arc::from(factory));
    Ok(())
}

fn reflector_factory_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    let factory = config
        .alias_registry()
        .resolve_alias(node.required_attribute("type")?)?
        .instantiate_reflector_factory()?;
    config.set_reflector_factory(Arc::from(factory));
    Ok(())
}

fn transaction_manager_element(
    node: &Node,
    config: &Configuration,
) -> SqlMapResult<Arc<dyn TransactionFactory>> {
    let mut factory = config
        .alias_registry()
        .resolve_alias(node.required_attribute("type")?)?
        .instantiate_transaction_factory()?;
    factory.set_properties(&node.children_as_properties())?;
    Ok(Arc::from(factory))
}

fn data_source_element(node: &Node, config: &Configuration) -> SqlMapResult<Arc<dyn DataSource>> {
    let mut factory = config
        .alias_registry()
        .resolve_alias(node.required_attribute("type")?)?
        .instantiate_data_source_factory()?;
    factory.set_properties(&node.children_as_properties())?;
    factory.data_source()
}

fn database_id_provider_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    let mut type_name = node.required_attribute("type")?;
    if type_name == LEGACY_VENDOR_ALIAS {
        type_name = VENDOR_ALIAS;
    }
    let mut provider = config
        .alias_registry()
        .resolve_alias(type_name)?
        .instantiate_database_id_provider()?;
    provider.set_properties(&node.children_as_properties())?;

    let database_id = match config.environment() {
        Some(env) => provider.database_id(env.data_source().as_ref())?,
        None => return Ok(()),
    };
    debug!(database_id = ?database_id, "Resolved database id");
    config.set_database_id(database_id);
    Ok(())
}

fn type_handlers_element(node: &Node, config: &mut Configuration) -> SqlMapResult<()> {
    for child in &node.children {
        match child.name.as_str() {
            "package" => {
                let handlers = config
                    .alias_registry()
                    .catalog()
                    .scan(child.required_attribute("name")?, TypeKind::TypeHandler);
                for handler in handlers {
                    config.type_handlers_mut().register_mapped(handler)?;
                }
            }
            "typeHandler" => {
                let aliases = config.alias_registry();
                let handler = aliases.resolve_alias(child.required_attribute("handler")?)?;
                let value_type = aliases.resolve_optional(child.attribute("javaType"))?;
                let jdbc_type = child
                    .attribute("jdbcType")
                    .map(|name| {
                        name.parse::<JdbcType>().map_err(|_| {
                            SqlMapError::component(
                                "typeHandler",
                                format!("Unknown jdbcType '{}'", name),
                            )
                        })
                    })
                    .transpose()?;
                match value_type {
                    Some(value_type) => {
                        config
                            .type_handlers_mut()
                            .register(&value_type, jdbc_type, handler)?
                    }
                    None => config.type_handlers_mut().register_mapped(handler)?,
                }
            }
            other => debug!(element = %other, "Ignoring unknown typeHandlers child"),
        }
    }
    Ok(())
}
