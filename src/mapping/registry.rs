use crate::error::{SqlMapError, SqlMapResult};
use crate::types::{TypeCatalog, TypeKind, TypeRef};
use std::collections::BTreeMap;
use tracing::debug;

/// Mapper types known to a configuration.
#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    mappers: BTreeMap<String, TypeRef>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one mapper type. Each type may be registered once.
    pub fn add_mapper(&mut self, mapper: TypeRef) -> SqlMapResult<()> {
        if !mapper.is_assignable_to(TypeKind::Mapper) {
            return Err(SqlMapError::type_mismatch(
                mapper.name(),
                TypeKind::Mapper.describe(),
            ));
        }
        if self.mappers.contains_key(mapper.name()) {
            return Err(SqlMapError::already_registered("Mapper", mapper.name()));
        }
        debug!(mapper = %mapper.name(), "Registered mapper");
        self.mappers.insert(mapper.name().to_string(), mapper);
        Ok(())
    }

    /// Register every mapper type below `scope`.
    pub fn add_mappers(&mut self, catalog: &TypeCatalog, scope: &str) -> SqlMapResult<()> {
        for mapper in catalog.scan(scope, TypeKind::Mapper) {
            self.add_mapper(mapper)?;
        }
        Ok(())
    }

    pub fn has_mapper(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    /// Registered mapper names, sorted.
    pub fn mapper_names(&self) -> impl Iterator<Item = &str> {
        self.mappers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}
