//! Case-insensitive alias registry.

use super::catalog::names;
use super::{TypeCatalog, TypeDescriptor, TypeKind, TypeRef};
use crate::error::{SqlMapError, SqlMapResult};
use std::collections::HashMap;
use tracing::debug;

/// Boxed scalar aliases; `_name` selects the plain form and `[]` the array form.
const SCALAR_ALIASES: &[(&str, &str)] = &[
    ("byte", "i8"),
    ("long", "i64"),
    ("short", "i16"),
    ("int", "i32"),
    ("integer", "i32"),
    ("double", "f64"),
    ("float", "f32"),
    ("boolean", "bool"),
];

const VALUE_ALIASES: &[(&str, &str)] = &[
    ("string", names::STRING),
    ("date", names::DATE),
    ("decimal", names::DECIMAL),
    ("bigdecimal", names::DECIMAL),
    ("biginteger", names::BIG_INTEGER),
    ("object", names::OBJECT),
    ("map", names::MAP),
    ("hashmap", names::MAP),
    ("list", names::LIST),
    ("arraylist", names::LIST),
    ("collection", names::LIST),
    ("iterator", names::ITERATOR),
    ("ResultSet", names::RESULT_SET),
];

const ARRAY_ALIASES: &[(&str, &str)] = &[
    ("date[]", names::DATE),
    ("decimal[]", names::DECIMAL),
    ("bigdecimal[]", names::DECIMAL),
    ("biginteger[]", names::BIG_INTEGER),
    ("object[]", names::OBJECT),
];

/// Maps short names onto registered types.
///
/// Lookups lower-case the alias; a name that is not an alias is loaded from the owned
/// [`TypeCatalog`] as a qualified type name.
#[derive(Debug, Clone)]
pub struct AliasRegistry {
    catalog: TypeCatalog,
    aliases: HashMap<String, TypeRef>,
}

impl AliasRegistry {
    /// Registry over `catalog`, seeded with the scalar and collection aliases.
    pub fn new(catalog: TypeCatalog) -> SqlMapResult<Self> {
        let mut registry = Self {
            catalog,
            aliases: HashMap::new(),
        };

        for (alias, scalar) in SCALAR_ALIASES {
            registry.register_alias_by_name(alias, &format!("Option<{}>", scalar))?;
            registry.register_alias_by_name(&format!("{}[]", alias), &format!("Vec<Option<{}>>", scalar))?;
            registry.register_alias_by_name(&format!("_{}", alias), scalar)?;
            registry.register_alias_by_name(&format!("_{}[]", alias), &format!("Vec<{}>", scalar))?;
        }
        for (alias, name) in VALUE_ALIASES {
            registry.register_alias_by_name(alias, name)?;
        }
        for (alias, element) in ARRAY_ALIASES {
            registry.register_alias_by_name(alias, &format!("Vec<{}>", element))?;
        }
        Ok(registry)
    }

    /// Registry over the built-in catalog.
    pub fn with_builtins() -> SqlMapResult<Self> {
        Self::new(TypeCatalog::with_builtins())
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut TypeCatalog {
        &mut self.catalog
    }

    /// Resolve an alias, falling back to loading `name` as a qualified type name.
    pub fn resolve_alias(&self, name: &str) -> SqlMapResult<TypeRef> {
        match self.aliases.get(&name.to_lowercase()) {
            Some(ty) => Ok(ty.clone()),
            None => self.catalog.load(name),
        }
    }

    /// Like [`resolve_alias`](Self::resolve_alias) for optional attributes.
    pub fn resolve_optional(&self, name: Option<&str>) -> SqlMapResult<Option<TypeRef>> {
        name.map(|n| self.resolve_alias(n)).transpose()
    }

    /// Bind `alias` to `ty`. Rebinding to the same type is a no-op.
    pub fn register_alias(&mut self, alias: &str, ty: TypeRef) -> SqlMapResult<()> {
        let key = alias.to_lowercase();
        if let Some(existing) = self.aliases.get(&key) {
            if existing.name() != ty.name() {
                return Err(SqlMapError::alias_conflict(alias, existing.name(), ty.name()));
            }
            return Ok(());
        }
        debug!(alias = %alias, type_name = %ty.name(), "Registered type alias");
        self.aliases.insert(key, ty);
        Ok(())
    }

    /// Bind the type's explicit alias, or its simple name.
    pub fn register_type(&mut self, ty: TypeRef) -> SqlMapResult<()> {
        let alias = ty.default_alias().to_string();
        self.register_alias(&alias, ty)
    }

    /// Bind `alias` to the type loaded by qualified name.
    pub fn register_alias_by_name(&mut self, alias: &str, type_name: &str) -> SqlMapResult<()> {
        let ty = self.catalog.load(type_name)?;
        self.register_alias(alias, ty)
    }

    /// Register every concrete type under `scope` assignable to `bound`.
    pub fn register_aliases_from_scope(&mut self, scope: &str, bound: TypeKind) -> SqlMapResult<()> {
        for ty in self.catalog.scan(scope, bound) {
            self.register_type(ty)?;
        }
        Ok(())
    }

    /// Add a type to the catalog and alias it in one step.
    pub fn register_new_type(&mut self, descriptor: TypeDescriptor) -> SqlMapResult<TypeRef> {
        let ty = self.catalog.register(descriptor)?;
        self.register_type(ty.clone())?;
        Ok(ty)
    }

    /// Aliases currently bound, keyed by their lower-cased spelling.
    pub fn aliases(&self) -> &HashMap<String, TypeRef> {
        &self.aliases
    }
}
