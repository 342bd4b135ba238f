//! Type handler registrations: value type -> wire type -> handler.

use super::{JdbcType, TypeDescriptor, TypeKind, TypeRef};
use crate::error::{SqlMapError, SqlMapResult};
use std::collections::HashMap;

const HANDLER_SCOPE: &str = "sqlsession::types::handler";

/// Handler used for enums unless `defaultEnumTypeHandler` names another one.
pub const ENUM_TYPE_HANDLER: &str = "sqlsession::types::handler::EnumTypeHandler";

pub(super) fn builtin_handlers() -> Vec<TypeDescriptor> {
    let handler = |simple: &str| {
        TypeDescriptor::new(format!("{}::{}", HANDLER_SCOPE, simple), TypeKind::TypeHandler)
    };
    vec![
        handler("StringTypeHandler").maps("String"),
        handler("BooleanTypeHandler").maps("Option<bool>").maps("bool"),
        handler("ByteTypeHandler").maps("Option<i8>").maps("i8"),
        handler("ShortTypeHandler").maps("Option<i16>").maps("i16"),
        handler("IntegerTypeHandler").maps("Option<i32>").maps("i32"),
        handler("LongTypeHandler").maps("Option<i64>").maps("i64"),
        handler("FloatTypeHandler").maps("Option<f32>").maps("f32"),
        handler("DoubleTypeHandler").maps("Option<f64>").maps("f64"),
        handler("DateTypeHandler").maps("std::time::SystemTime"),
        handler("EnumTypeHandler"),
        handler("EnumOrdinalTypeHandler"),
    ]
}

/// Registered handlers.
///
/// A registration without a wire type is the default for its value type. Handlers that
/// declare no value type are kept aside until a mapping names the value type explicitly.
#[derive(Debug, Clone, Default)]
pub struct TypeHandlerRegistry {
    by_value: HashMap<String, HashMap<Option<JdbcType>, TypeRef>>,
    unmapped: Vec<TypeRef>,
}

impl TypeHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in handlers from `catalog`.
    pub fn with_builtins(catalog: &super::TypeCatalog) -> SqlMapResult<Self> {
        let mut registry = Self::new();
        for handler in catalog.scan(HANDLER_SCOPE, TypeKind::TypeHandler) {
            registry.register_mapped(handler)?;
        }
        Ok(registry)
    }

    /// Register `handler` for `value_type` and an optional wire type.
    pub fn register(
        &mut self,
        value_type: &TypeRef,
        jdbc_type: Option<JdbcType>,
        handler: TypeRef,
    ) -> SqlMapResult<()> {
        Self::ensure_handler(&handler)?;
        self.by_value
            .entry(value_type.name().to_string())
            .or_default()
            .insert(jdbc_type, handler);
        Ok(())
    }

    /// Register `handler` for the value types it declares.
    pub fn register_mapped(&mut self, handler: TypeRef) -> SqlMapResult<()> {
        Self::ensure_handler(&handler)?;
        if handler.mapped_types().is_empty() {
            if !self.unmapped.contains(&handler) {
                self.unmapped.push(handler);
            }
            return Ok(());
        }
        for value_type in handler.mapped_types() {
            self.by_value
                .entry(value_type.clone())
                .or_default()
                .insert(None, handler.clone());
        }
        Ok(())
    }

    /// Handler for a value type, preferring an exact wire-type match over the default.
    pub fn handler_for(&self, value_type: &str, jdbc_type: Option<JdbcType>) -> Option<&TypeRef> {
        let handlers = self.by_value.get(value_type)?;
        jdbc_type
            .and_then(|jt| handlers.get(&Some(jt)))
            .or_else(|| handlers.get(&None))
    }

    pub fn has_handler(&self, value_type: &str) -> bool {
        self.by_value.contains_key(value_type)
    }

    pub fn unmapped(&self) -> &[TypeRef] {
        &self.unmapped
    }

    fn ensure_handler(handler: &TypeRef) -> SqlMapResult<()> {
        if handler.is_assignable_to(TypeKind::TypeHandler) {
            Ok(())
        } else {
            Err(SqlMapError::type_mismatch(
                handler.name(),
                TypeKind::TypeHandler.describe(),
            ))
        }
    }
}
