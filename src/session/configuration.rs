//! The resolved runtime configuration shared by every session.

use super::settings::Settings;
use crate::cache::{Cache, PerpetualCache};
use crate::datasource::{PooledDataSourceFactory, UnpooledDataSourceFactory};
use crate::error::{SqlMapError, SqlMapResult};
use crate::executor::{BaseExecutor, CachingExecutor, Executor, ExecutorType};
use crate::io::{DefaultVfs, ResourceLoader};
use crate::logging::{NoLogging, TracingLog};
use crate::mapping::language::{RawLanguageDriver, XmlLanguageDriver};
use crate::mapping::{
    Environment, MappedStatement, MapperRegistry, PendingStatement, SqlFragments,
    VendorDatabaseIdProvider,
};
use crate::parsing::Properties;
use crate::plugin::{Interceptor, InterceptorChain, PluginRejected};
use crate::reflection::{
    DefaultObjectFactory, DefaultObjectWrapperFactory, DefaultReflectorFactory, ObjectFactory,
    ObjectWrapperFactory, ReflectorFactory,
};
use crate::transaction::{JdbcTransactionFactory, ManagedTransactionFactory, Transaction};
use crate::types::{AliasRegistry, TypeHandlerRegistry, TypeKind, TypeRef};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Aliases for the built-in components.
const COMPONENT_ALIASES: &[(&str, &str)] = &[
    ("JDBC", JdbcTransactionFactory::TYPE_NAME),
    ("MANAGED", ManagedTransactionFactory::TYPE_NAME),
    ("POOLED", PooledDataSourceFactory::TYPE_NAME),
    ("UNPOOLED", UnpooledDataSourceFactory::TYPE_NAME),
    ("PERPETUAL", PerpetualCache::TYPE_NAME),
    ("DB_VENDOR", VendorDatabaseIdProvider::TYPE_NAME),
    ("XML", XmlLanguageDriver::TYPE_NAME),
    ("RAW", RawLanguageDriver::TYPE_NAME),
    ("TRACING", TracingLog::TYPE_NAME),
    ("NO_LOGGING", NoLogging::TYPE_NAME),
];

/// Everything a session needs, resolved once from a declarative tree.
///
/// A configuration is mutable while it is being built and then shared read-only behind an
/// `Arc` by the [`SqlSessionFactory`](super::SqlSessionFactory).
pub struct Configuration {
    settings: Settings,
    variables: Properties,
    alias_registry: AliasRegistry,
    type_handlers: TypeHandlerRegistry,
    environment: Option<Environment>,
    database_id: Option<String>,
    interceptors: InterceptorChain,
    object_factory: Arc<dyn ObjectFactory>,
    object_wrapper_factory: Arc<dyn ObjectWrapperFactory>,
    reflector_factory: Arc<dyn ReflectorFactory>,
    vfs_impls: Vec<TypeRef>,
    log_impl: Option<TypeRef>,
    mapper_registry: MapperRegistry,
    namespaces: BTreeSet<String>,
    caches: HashMap<String, Arc<dyn Cache>>,
    mapped_statements: BTreeMap<String, MappedStatement>,
    incomplete_statements: Vec<PendingStatement>,
    loaded_resources: BTreeSet<String>,
    sql_fragments: SqlFragments,
    resource_loader: Arc<dyn ResourceLoader>,
}

impl Configuration {
    /// Configuration over the built-in type catalog.
    pub fn new(resource_loader: Arc<dyn ResourceLoader>) -> SqlMapResult<Self> {
        Self::with_aliases(AliasRegistry::with_builtins()?, resource_loader)
    }

    /// Configuration over an alias registry whose catalog may hold application types.
    pub fn with_aliases(
        mut alias_registry: AliasRegistry,
        resource_loader: Arc<dyn ResourceLoader>,
    ) -> SqlMapResult<Self> {
        for (alias, type_name) in COMPONENT_ALIASES {
            alias_registry.register_alias_by_name(alias, type_name)?;
        }
        let type_handlers = TypeHandlerRegistry::with_builtins(alias_registry.catalog())?;
        Ok(Self {
            settings: Settings::default(),
            variables: Properties::new(),
            alias_registry,
            type_handlers,
            environment: None,
            database_id: None,
            interceptors: InterceptorChain::new(),
            object_factory: Arc::new(DefaultObjectFactory),
            object_wrapper_factory: Arc::new(DefaultObjectWrapperFactory),
            reflector_factory: Arc::new(DefaultReflectorFactory::default()),
            vfs_impls: Vec::new(),
            log_impl: None,
            mapper_registry: MapperRegistry::new(),
            namespaces: BTreeSet::new(),
            caches: HashMap::new(),
            mapped_statements: BTreeMap::new(),
            incomplete_statements: Vec::new(),
            loaded_resources: BTreeSet::new(),
            sql_fragments: SqlFragments::new(),
            resource_loader,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Variables available to `${name}` placeholders.
    pub fn variables(&self) -> &Properties {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: Properties) {
        self.variables = variables;
    }

    pub fn alias_registry(&self) -> &AliasRegistry {
        &self.alias_registry
    }

    pub fn alias_registry_mut(&mut self) -> &mut AliasRegistry {
        &mut self.alias_registry
    }

    pub fn type_handlers(&self) -> &TypeHandlerRegistry {
        &self.type_handlers
    }

    pub fn type_handlers_mut(&mut self) -> &mut TypeHandlerRegistry {
        &mut self.type_handlers
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = Some(environment);
    }

    pub fn database_id(&self) -> Option<&str> {
        self.database_id.as_deref()
    }

    pub fn set_database_id(&mut self, database_id: Option<String>) {
        self.database_id = database_id;
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    pub fn add_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.add(interceptor);
    }

    pub fn object_factory(&self) -> &Arc<dyn ObjectFactory> {
        &self.object_factory
    }

    pub fn set_object_factory(&mut self, factory: Arc<dyn ObjectFactory>) {
        self.object_factory = factory;
    }

    pub fn object_wrapper_factory(&self) -> &Arc<dyn ObjectWrapperFactory> {
        &self.object_wrapper_factory
    }

    pub fn set_object_wrapper_factory(&mut self, factory: Arc<dyn ObjectWrapperFactory>) {
        self.object_wrapper_factory = factory;
    }

    pub fn reflector_factory(&self) -> &Arc<dyn ReflectorFactory> {
        &self.reflector_factory
    }

    pub fn set_reflector_factory(&mut self, factory: Arc<dyn ReflectorFactory>) {
        self.reflector_factory = factory;
    }

    /// Custom virtual filesystems, in registration order.
    pub fn vfs_impls(&self) -> &[TypeRef] {
        &self.vfs_impls
    }

    /// Register a virtual filesystem; the same type is kept once.
    pub fn add_vfs_impl(&mut self, vfs: TypeRef) -> SqlMapResult<()> {
        ensure_kind(&vfs, TypeKind::Vfs)?;
        if !self.vfs_impls.contains(&vfs) {
            self.vfs_impls.push(vfs);
        }
        Ok(())
    }

    /// Name of the active virtual filesystem: the last one registered, or the default.
    pub fn vfs_name(&self) -> &str {
        self.vfs_impls
            .last()
            .map(|ty| ty.name())
            .unwrap_or(DefaultVfs::TYPE_NAME)
    }

    pub fn log_impl(&self) -> Option<&TypeRef> {
        self.log_impl.as_ref()
    }

    pub fn set_log_impl(&mut self, log_impl: Option<TypeRef>) -> SqlMapResult<()> {
        if let Some(ty) = &log_impl {
            ensure_kind(ty, TypeKind::Log)?;
        }
        self.log_impl = log_impl;
        Ok(())
    }

    pub fn mapper_registry(&self) -> &MapperRegistry {
        &self.mapper_registry
    }

    /// Register a mapper type.
    pub fn add_mapper(&mut self, mapper: TypeRef) -> SqlMapResult<()> {
        self.mapper_registry.add_mapper(mapper)
    }

    /// Register every mapper type below `scope`.
    pub fn add_mappers(&mut self, scope: &str) -> SqlMapResult<()> {
        self.mapper_registry
            .add_mappers(self.alias_registry.catalog(), scope)
    }

    pub fn add_namespace(&mut self, namespace: &str) {
        self.namespaces.insert(namespace.to_string());
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Register a namespace cache under its id.
    pub fn add_cache(&mut self, cache: Arc<dyn Cache>) -> SqlMapResult<()> {
        let id = cache.identity()?.to_string();
        if self.caches.contains_key(&id) {
            return Err(SqlMapError::already_registered("Cache", id));
        }
        debug!(cache = %id, "Registered namespace cache");
        self.caches.insert(id, cache);
        Ok(())
    }

    pub fn cache(&self, id: &str) -> Option<&Arc<dyn Cache>> {
        self.caches.get(id)
    }

    /// Add a statement.
    ///
    /// A statement declared for the active database id replaces a generic one with the
    /// same id and is never replaced by one. Any other duplicate is an error.
    pub fn add_mapped_statement(&mut self, statement: MappedStatement) -> SqlMapResult<()> {
        match self.mapped_statements.get(&statement.id) {
            None => {}
            Some(existing) => match (&existing.database_id, &statement.database_id) {
                (Some(_), None) => {
                    debug!(statement = %statement.id, "Keeping database-specific statement");
                    return Ok(());
                }
                (None, Some(_)) => {}
                _ => {
                    return Err(SqlMapError::already_registered(
                        "Mapped statement",
                        &statement.id,
                    ));
                }
            },
        }
        debug!(statement = %statement.id, "Registered mapped statement");
        self.mapped_statements
            .insert(statement.id.clone(), statement);
        Ok(())
    }

    pub fn mapped_statement(&self, id: &str) -> Option<&MappedStatement> {
        self.mapped_statements.get(id)
    }

    pub fn mapped_statements(&self) -> impl Iterator<Item = &MappedStatement> {
        self.mapped_statements.values()
    }

    pub fn add_incomplete_statement(&mut self, pending: PendingStatement) {
        self.incomplete_statements.push(pending);
    }

    pub fn take_incomplete_statements(&mut self) -> Vec<PendingStatement> {
        std::mem::take(&mut self.incomplete_statements)
    }

    /// Statements still waiting for a fragment.
    pub fn incomplete_statements(&self) -> &[PendingStatement] {
        &self.incomplete_statements
    }

    pub fn add_loaded_resource(&mut self, resource: &str) {
        self.loaded_resources.insert(resource.to_string());
    }

    pub fn is_resource_loaded(&self, resource: &str) -> bool {
        self.loaded_resources.contains(resource)
    }

    /// Fragment registry shared by every mapping document of this configuration.
    pub fn sql_fragments(&self) -> &SqlFragments {
        &self.sql_fragments
    }

    pub fn resource_loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.resource_loader
    }

    /// Build the executor for a new session: base executor, the caching decorator when
    /// `cacheEnabled`, then every interceptor.
    pub fn new_executor(
        &self,
        transaction: Box<dyn Transaction>,
        executor_type: ExecutorType,
    ) -> Result<Box<dyn Executor>, PluginRejected> {
        let mut executor: Box<dyn Executor> =
            Box::new(BaseExecutor::new(transaction, executor_type));
        if self.settings.cache_enabled {
            executor = Box::new(CachingExecutor::new(executor));
        }
        self.interceptors.plugin_all(executor)
    }

    /// Serializable overview of the resolved state.
    pub fn summary(&self) -> ConfigurationSummary {
        let mut aliases: Vec<String> = self.alias_registry.aliases().keys().cloned().collect();
        aliases.sort();
        ConfigurationSummary {
            environment: self.environment.as_ref().map(|env| EnvironmentSummary {
                id: env.id().to_string(),
                database: env.data_source().product_name().to_string(),
            }),
            database_id: self.database_id.clone(),
            settings: self.settings.clone(),
            variables: self.variables.keys().cloned().collect(),
            aliases,
            interceptors: self.interceptors.len(),
            object_factory: self.object_factory.name().to_string(),
            object_wrapper_factory: self.object_wrapper_factory.name().to_string(),
            reflector_factory: self.reflector_factory.name().to_string(),
            vfs: self.vfs_name().to_string(),
            log_impl: self.log_impl.as_ref().map(|ty| ty.name().to_string()),
            mappers: self
                .mapper_registry
                .mapper_names()
                .map(str::to_string)
                .collect(),
            namespaces: self.namespaces.iter().cloned().collect(),
            caches: {
                let mut ids: Vec<String> = self.caches.keys().cloned().collect();
                ids.sort();
                ids
            },
            mapped_statements: self.mapped_statements.keys().cloned().collect(),
            incomplete_statements: self.incomplete_statements.len(),
            loaded_resources: self.loaded_resources.iter().cloned().collect(),
        }
    }
}

fn ensure_kind(ty: &TypeRef, kind: TypeKind) -> SqlMapResult<()> {
    if ty.is_assignable_to(kind) {
        Ok(())
    } else {
        Err(SqlMapError::type_mismatch(ty.name(), kind.describe()))
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("environment", &self.environment)
            .field("database_id", &self.database_id)
            .field("settings", &self.settings)
            .field("interceptors", &self.interceptors)
            .field("mapped_statements", &self.mapped_statements.len())
            .finish()
    }
}

/// JSON-friendly view of a [`Configuration`]. Variable values are omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    pub environment: Option<EnvironmentSummary>,
    pub database_id: Option<String>,
    pub settings: Settings,
    pub variables: Vec<String>,
    pub aliases: Vec<String>,
    pub interceptors: usize,
    pub object_factory: String,
    pub object_wrapper_factory: String,
    pub reflector_factory: String,
    pub vfs: String,
    pub log_impl: Option<String>,
    pub mappers: Vec<String>,
    pub namespaces: Vec<String>,
    pub caches: Vec<String>,
    pub mapped_statements: Vec<String>,
    pub incomplete_statements: usize,
    pub loaded_resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSummary {
    pub id: String,
    pub database: String,
}
