//! Type identifiers, the static type catalog and the alias registry.
//!
//! A [`TypeDescriptor`] stands in for a concrete implementation: a qualified name, the
//! component kind it provides, and a constructor. Declarative trees name types either by
//! qualified name (`sqlsession::cache::PerpetualCache`) or by alias (`PERPETUAL`).

pub mod alias;
pub mod catalog;
pub mod handler;
pub mod jdbc;

pub use alias::AliasRegistry;
pub use catalog::TypeCatalog;
pub use handler::TypeHandlerRegistry;
pub use jdbc::JdbcType;

use crate::cache::Cache;
use crate::datasource::DataSourceFactory;
use crate::error::{SqlMapError, SqlMapResult};
use crate::mapping::DatabaseIdProvider;
use crate::plugin::Interceptor;
use crate::reflection::{ObjectFactory, ObjectWrapperFactory, ReflectorFactory};
use crate::transaction::TransactionFactory;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to a registered type.
pub type TypeRef = Arc<TypeDescriptor>;

/// What a registered type provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// The root kind; every type is assignable to it.
    Object,
    Value,
    Collection,
    TransactionFactory,
    DataSourceFactory,
    Interceptor,
    ObjectFactory,
    ObjectWrapperFactory,
    ReflectorFactory,
    DatabaseIdProvider,
    TypeHandler,
    Vfs,
    Log,
    LanguageDriver,
    Cache,
    Mapper,
    /// Application model types, registered for aliasing only.
    Model,
}

impl TypeKind {
    pub fn is_assignable_to(self, bound: TypeKind) -> bool {
        bound == TypeKind::Object || self == bound
    }

    /// Human-readable name used in error messages.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Object => "an object",
            Self::Value => "a value",
            Self::Collection => "a collection",
            Self::TransactionFactory => "a transaction factory",
            Self::DataSourceFactory => "a data source factory",
            Self::Interceptor => "an interceptor",
            Self::ObjectFactory => "an object factory",
            Self::ObjectWrapperFactory => "an object wrapper factory",
            Self::ReflectorFactory => "a reflector factory",
            Self::DatabaseIdProvider => "a database id provider",
            Self::TypeHandler => "a type handler",
            Self::Vfs => "a virtual filesystem",
            Self::Log => "a log implementation",
            Self::LanguageDriver => "a language driver",
            Self::Cache => "a cache",
            Self::Mapper => "a mapper",
            Self::Model => "a model type",
        }
    }
}

/// No-argument constructors, one variant per component kind.
#[derive(Clone, Copy)]
pub enum Constructor {
    TransactionFactory(fn() -> Box<dyn TransactionFactory>),
    DataSourceFactory(fn() -> Box<dyn DataSourceFactory>),
    Interceptor(fn() -> Box<dyn Interceptor>),
    ObjectFactory(fn() -> Box<dyn ObjectFactory>),
    ObjectWrapperFactory(fn() -> Box<dyn ObjectWrapperFactory>),
    ReflectorFactory(fn() -> Box<dyn ReflectorFactory>),
    DatabaseIdProvider(fn() -> Box<dyn DatabaseIdProvider>),
    /// Caches are constructed with their id.
    Cache(fn(&str) -> Box<dyn Cache>),
    Value(fn() -> Box<dyn Any + Send>),
}

/// Constructor for any `Default` value type.
pub fn default_value<T: Default + Any + Send>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

/// Metadata for one registrable type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    alias: Option<String>,
    constructor: Option<Constructor>,
    is_abstract: bool,
    is_nested: bool,
    mapped_types: Vec<String>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            alias: None,
            constructor: None,
            is_abstract: false,
            is_nested: false,
            mapped_types: Vec::new(),
        }
    }

    /// Explicit alias, used instead of the simple name when registering by type.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Mark as an interface or abstract type; scans skip it.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as declared inside another type; scans skip it.
    pub fn nested(mut self) -> Self {
        self.is_nested = true;
        self
    }

    /// Value type handled by a type handler.
    pub fn maps(mut self, value_type: impl Into<String>) -> Self {
        self.mapped_types.push(value_type.into());
        self
    }

    pub fn into_ref(self) -> TypeRef {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Last path segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }

    /// Alias used by [`AliasRegistry::register_type`].
    pub fn default_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.simple_name())
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_nested(&self) -> bool {
        self.is_nested
    }

    pub fn mapped_types(&self) -> &[String] {
        &self.mapped_types
    }

    pub fn is_assignable_to(&self, bound: TypeKind) -> bool {
        self.kind.is_assignable_to(bound)
    }

    /// Construct a cache instance with the given id.
    pub fn instantiate_cache(&self, id: &str) -> SqlMapResult<Box<dyn Cache>> {
        match self.constructor {
            Some(Constructor::Cache(ctor)) => Ok(ctor(id)),
            _ => Err(self.mismatch(TypeKind::Cache)),
        }
    }

    /// Construct a plain value.
    pub fn instantiate_value(&self) -> SqlMapResult<Box<dyn Any + Send>> {
        match self.constructor {
            Some(Constructor::Value(ctor)) => Ok(ctor()),
            _ => Err(SqlMapError::type_mismatch(
                &self.name,
                "a value with a no-argument constructor",
            )),
        }
    }

    fn mismatch(&self, expected: TypeKind) -> SqlMapError {
        SqlMapError::type_mismatch(&self.name, expected.describe())
    }
}

macro_rules! component_constructors {
    ($( $method:ident => $variant:ident ( $component:ty ) ),+ $(,)?) => {
        impl TypeDescriptor {
            $(
                #[doc = concat!("Construct the `", stringify!($variant), "` this type provides.")]
                pub fn $method(&self) -> SqlMapResult<Box<$component>> {
                    match self.constructor {
                        Some(Constructor::$variant(ctor)) => Ok(ctor()),
                        _ => Err(self.mismatch(TypeKind::$variant)),
                    }
                }
            )+
        }
    };
}

component_constructors! {
    instantiate_transaction_factory => TransactionFactory(dyn TransactionFactory),
    instantiate_data_source_factory => DataSourceFactory(dyn DataSourceFactory),
    instantiate_interceptor => Interceptor(dyn Interceptor),
    instantiate_object_factory => ObjectFactory(dyn ObjectFactory),
    instantiate_object_wrapper_factory => ObjectWrapperFactory(dyn ObjectWrapperFactory),
    instantiate_reflector_factory => ReflectorFactory(dyn ReflectorFactory),
    instantiate_database_id_provider => DatabaseIdProvider(dyn DatabaseIdProvider),
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("alias", &self.alias)
            .field("has_constructor", &self.constructor.is_some())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
