//! Object creation strategies consulted by result mapping.
//!
//! Result mapping itself lives outside this crate; the configuration only records which
//! strategies are installed so that collaborators can look them up.

use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::Properties;
use crate::types::{Constructor, TypeDescriptor, TypeKind, TypeRef};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

/// Creates instances of registered value types.
pub trait ObjectFactory: Send + Sync {
    fn set_properties(&mut self, _properties: &Properties) -> SqlMapResult<()> {
        Ok(())
    }

    /// Instantiate `ty` with its no-argument constructor.
    fn create(&self, ty: &TypeRef) -> SqlMapResult<Box<dyn Any + Send>>;

    fn is_collection(&self, ty: &TypeRef) -> bool;

    /// Name used in configuration summaries.
    fn name(&self) -> &str;
}

/// Supplies custom wrappers for result objects.
pub trait ObjectWrapperFactory: Send + Sync {
    fn has_wrapper_for(&self, ty: &TypeRef) -> bool;

    fn name(&self) -> &str;
}

/// Caches per-type metadata.
pub trait ReflectorFactory: Send + Sync {
    fn is_class_cache_enabled(&self) -> bool;

    fn set_class_cache_enabled(&self, enabled: bool);

    fn name(&self) -> &str;
}

#[derive(Debug, Default)]
pub struct DefaultObjectFactory;

impl DefaultObjectFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::reflection::DefaultObjectFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::ObjectFactory)
            .with_constructor(Constructor::ObjectFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn ObjectFactory> {
        Box::new(Self)
    }
}

impl ObjectFactory for DefaultObjectFactory {
    fn create(&self, ty: &TypeRef) -> SqlMapResult<Box<dyn Any + Send>> {
        if ty.is_abstract() {
            return Err(SqlMapError::type_mismatch(
                ty.name(),
                "a concrete type (abstract types cannot be instantiated)",
            ));
        }
        ty.instantiate_value()
    }

    fn is_collection(&self, ty: &TypeRef) -> bool {
        ty.kind() == TypeKind::Collection
    }

    fn name(&self) -> &str {
        Self::TYPE_NAME
    }
}

/// Provides no wrappers.
#[derive(Debug, Default)]
pub struct DefaultObjectWrapperFactory;

impl DefaultObjectWrapperFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::reflection::DefaultObjectWrapperFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::ObjectWrapperFactory)
            .with_constructor(Constructor::ObjectWrapperFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn ObjectWrapperFactory> {
        Box::new(Self)
    }
}

impl ObjectWrapperFactory for DefaultObjectWrapperFactory {
    fn has_wrapper_for(&self, _ty: &TypeRef) -> bool {
        false
    }

    fn name(&self) -> &str {
        Self::TYPE_NAME
    }
}

#[derive(Debug)]
pub struct DefaultReflectorFactory {
    class_cache_enabled: AtomicBool,
}

impl Default for DefaultReflectorFactory {
    fn default() -> Self {
        Self {
            class_cache_enabled: AtomicBool::new(true),
        }
    }
}

impl DefaultReflectorFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::reflection::DefaultReflectorFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::ReflectorFactory)
            .with_constructor(Constructor::ReflectorFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn ReflectorFactory> {
        Box::new(Self::default())
    }
}

impl ReflectorFactory for DefaultReflectorFactory {
    fn is_class_cache_enabled(&self) -> bool {
        self.class_cache_enabled.load(Ordering::Relaxed)
    }

    fn set_class_cache_enabled(&self, enabled: bool) {
        self.class_cache_enabled.store(enabled, Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        Self::TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeCatalog;

    #[test]
    fn test_create_uses_value_constructor() {
        let catalog = TypeCatalog::with_builtins();
        let factory = DefaultObjectFactory;
        let value = factory.create(&catalog.load("String").unwrap()).unwrap();
        assert_eq!(value.downcast_ref::<String>(), Some(&String::new()));

        let list = catalog.load("Vec").unwrap();
        assert!(factory.is_collection(&list));
        assert!(!factory.is_collection(&catalog.load("i64").unwrap()));
    }

    #[test]
    fn test_create_rejects_abstract_and_components() {
        let catalog = TypeCatalog::with_builtins();
        let factory = DefaultObjectFactory;
        assert!(factory.create(&catalog.load("std::iter::Iterator").unwrap()).is_err());
        let err = factory
            .create(&catalog.load(DefaultObjectFactory::TYPE_NAME).unwrap())
            .unwrap_err();
        assert!(matches!(err, SqlMapError::TypeMismatch { .. }));
    }

    #[test]
    fn test_reflector_class_cache_toggle() {
        let factory = DefaultReflectorFactory::default();
        assert!(factory.is_class_cache_enabled());
        factory.set_class_cache_enabled(false);
        assert!(!factory.is_class_cache_enabled());
    }
}
