//! Static registry of every type a declarative tree may name.
//!
//! Nothing is discovered at runtime: built-in types are registered by
//! [`TypeCatalog::with_builtins`] and applications add their own with
//! [`TypeCatalog::register`] before resolution starts.

use super::{Constructor, TypeDescriptor, TypeKind, TypeRef, default_value, handler};
use crate::cache::PerpetualCache;
use crate::datasource::{PooledDataSourceFactory, UnpooledDataSourceFactory};
use crate::error::{SqlMapError, SqlMapResult};
use crate::io::DefaultVfs;
use crate::logging::{NoLogging, TracingLog};
use crate::mapping::VendorDatabaseIdProvider;
use crate::mapping::language::{RawLanguageDriver, XmlLanguageDriver};
use crate::plugin::TracingInterceptor;
use crate::reflection::{DefaultObjectFactory, DefaultObjectWrapperFactory, DefaultReflectorFactory};
use crate::transaction::{JdbcTransactionFactory, ManagedTransactionFactory};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

/// Qualified names of the built-in non-scalar value types.
pub mod names {
    pub const STRING: &str = "String";
    pub const OBJECT: &str = "std::any::Any";
    pub const DATE: &str = "std::time::SystemTime";
    pub const DECIMAL: &str = "Decimal";
    pub const BIG_INTEGER: &str = "BigInt";
    pub const MAP: &str = "std::collections::HashMap";
    pub const LIST: &str = "Vec";
    pub const ITERATOR: &str = "std::iter::Iterator";
    pub const RESULT_SET: &str = "sqlx::any::AnyRow";
}

/// Name -> type table, ordered by qualified name.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeRef>,
}

impl TypeCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the scalar, collection and component types shipped with the crate.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for descriptor in builtin_value_types()
            .into_iter()
            .chain(builtin_component_types())
            .chain(handler::builtin_handlers())
        {
            catalog.insert(descriptor);
        }
        catalog
    }

    /// Add an application type. Registering a name twice is an error.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> SqlMapResult<TypeRef> {
        if self.types.contains_key(descriptor.name()) {
            return Err(SqlMapError::already_registered("Type", descriptor.name()));
        }
        Ok(self.insert(descriptor))
    }

    fn insert(&mut self, descriptor: TypeDescriptor) -> TypeRef {
        let ty = descriptor.into_ref();
        self.types.insert(ty.name().to_string(), ty.clone());
        ty
    }

    pub fn get(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    /// Load a type by qualified name.
    pub fn load(&self, name: &str) -> SqlMapResult<TypeRef> {
        self.get(name)
            .ok_or_else(|| SqlMapError::unresolved_type(name))
    }

    /// Concrete, top-level types below `scope` that are assignable to `bound`, by name.
    pub fn scan(&self, scope: &str, bound: TypeKind) -> Vec<TypeRef> {
        let prefix = format!("{}::", scope.trim_end_matches("::"));
        self.types
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(_, ty)| ty)
            .filter(|ty| !ty.is_abstract() && !ty.is_nested() && ty.is_assignable_to(bound))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn value<T: Default + Any + Send>(name: &str) -> TypeDescriptor {
    TypeDescriptor::new(name, TypeKind::Value).with_constructor(Constructor::Value(default_value::<T>))
}

fn builtin_value_types() -> Vec<TypeDescriptor> {
    let mut out = vec![
        value::<String>(names::STRING),
        TypeDescriptor::new(names::OBJECT, TypeKind::Object).abstract_type(),
        TypeDescriptor::new(names::DATE, TypeKind::Value),
        TypeDescriptor::new(names::DECIMAL, TypeKind::Value),
        TypeDescriptor::new(names::BIG_INTEGER, TypeKind::Value),
        value::<HashMap<String, Box<dyn Any + Send>>>(names::MAP),
        TypeDescriptor::new(names::LIST, TypeKind::Collection)
            .with_constructor(Constructor::Value(default_value::<Vec<Box<dyn Any + Send>>>)),
        TypeDescriptor::new(names::ITERATOR, TypeKind::Value).abstract_type(),
        TypeDescriptor::new(names::RESULT_SET, TypeKind::Value),
    ];
    for element in [names::DATE, names::DECIMAL, names::BIG_INTEGER, names::OBJECT] {
        out.push(TypeDescriptor::new(format!("Vec<{}>", element), TypeKind::Value));
    }

    macro_rules! scalars {
        ($($t:ident),+) => {
            $(
                out.push(value::<Option<$t>>(concat!("Option<", stringify!($t), ">")));
                out.push(value::<$t>(stringify!($t)));
                out.push(value::<Vec<Option<$t>>>(concat!("Vec<Option<", stringify!($t), ">>")));
                out.push(value::<Vec<$t>>(concat!("Vec<", stringify!($t), ">")));
            )+
        };
    }
    scalars!(i8, i16, i32, i64, f32, f64, bool);
    out
}

fn builtin_component_types() -> Vec<TypeDescriptor> {
    vec![
        JdbcTransactionFactory::descriptor(),
        ManagedTransactionFactory::descriptor(),
        PooledDataSourceFactory::descriptor(),
        UnpooledDataSourceFactory::descriptor(),
        PerpetualCache::descriptor(),
        VendorDatabaseIdProvider::descriptor(),
        XmlLanguageDriver::descriptor(),
        RawLanguageDriver::descriptor(),
        TracingLog::descriptor(),
        NoLogging::descriptor(),
        DefaultVfs::descriptor(),
        DefaultObjectFactory::descriptor(),
        DefaultObjectWrapperFactory::descriptor(),
        DefaultReflectorFactory::descriptor(),
        TracingInterceptor::descriptor(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builtin_and_unknown() {
        let catalog = TypeCatalog::with_builtins();
        assert_eq!(catalog.load("i32").unwrap().kind(), TypeKind::Value);
        assert!(catalog.load(JdbcTransactionFactory::TYPE_NAME).is_ok());

        let err = catalog.load("app::Missing").unwrap_err();
        assert!(matches!(err, SqlMapError::UnresolvedType { ref name } if name == "app::Missing"));
    }

    #[test]
    fn test_register_twice_fails() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register(TypeDescriptor::new("app::model::Blog", TypeKind::Model))
            .unwrap();
        let err = catalog
            .register(TypeDescriptor::new("app::model::Blog", TypeKind::Model))
            .unwrap_err();
        assert!(matches!(err, SqlMapError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_scan_filters_scope_kind_and_shape() {
        let mut catalog = TypeCatalog::new();
        for ty in [
            TypeDescriptor::new("app::model::Blog", TypeKind::Model),
            TypeDescriptor::new("app::model::Author", TypeKind::Model),
            TypeDescriptor::new("app::model::Entity", TypeKind::Model).abstract_type(),
            TypeDescriptor::new("app::model::Blog::Draft", TypeKind::Model).nested(),
            TypeDescriptor::new("app::model::audit::Entry", TypeKind::Model),
            TypeDescriptor::new("app::modeling::Tool", TypeKind::Model),
            TypeDescriptor::new("app::model::BlogCache", TypeKind::Cache),
        ] {
            catalog.register(ty).unwrap();
        }

        let names: Vec<_> = catalog
            .scan("app::model", TypeKind::Model)
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["app::model::Author", "app::model::Blog", "app::model::audit::Entry"]
        );

        let everything = catalog.scan("app::model", TypeKind::Object);
        assert_eq!(everything.len(), 4);
    }
}
