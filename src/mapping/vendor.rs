use crate::datasource::DataSource;
use crate::error::SqlMapResult;
use crate::parsing::Properties;
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use tracing::debug;

/// Derives the database id statements are filtered by.
pub trait DatabaseIdProvider: Send + Sync {
    fn set_properties(&mut self, _properties: &Properties) -> SqlMapResult<()> {
        Ok(())
    }

    fn database_id(&self, data_source: &dyn DataSource) -> SqlMapResult<Option<String>>;
}

/// Provider registered as `DB_VENDOR` (legacy `VENDOR`).
///
/// Without properties the id is the product name. With properties, the id is the value
/// of the first property whose key occurs in the product name, or none.
#[derive(Debug, Default)]
pub struct VendorDatabaseIdProvider {
    properties: Properties,
}

impl VendorDatabaseIdProvider {
    pub const TYPE_NAME: &'static str = "sqlsession::mapping::VendorDatabaseIdProvider";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::DatabaseIdProvider)
            .with_constructor(Constructor::DatabaseIdProvider(Self::boxed))
    }

    fn boxed() -> Box<dyn DatabaseIdProvider> {
        Box::new(Self::default())
    }
}

impl DatabaseIdProvider for VendorDatabaseIdProvider {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        self.properties = properties.clone();
        Ok(())
    }

    fn database_id(&self, data_source: &dyn DataSource) -> SqlMapResult<Option<String>> {
        let product = data_source.product_name();
        let id = if self.properties.is_empty() {
            Some(product.to_string())
        } else {
            self.properties
                .iter()
                .find(|(key, _)| product.contains(key.as_str()))
                .map(|(_, value)| value.clone())
        };
        debug!(product = %product, database_id = ?id, "Derived database id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CallLog, RecordingDataSource};

    #[test]
    fn test_product_name_without_properties() {
        let ds = RecordingDataSource::new(CallLog::default());
        let provider = VendorDatabaseIdProvider::default();
        assert_eq!(provider.database_id(&ds).unwrap().as_deref(), Some("SQLite"));
    }

    #[test]
    fn test_property_match_and_miss() {
        let ds = RecordingDataSource::new(CallLog::default());
        let mut provider = VendorDatabaseIdProvider::default();

        let mut props = Properties::new();
        props.insert("MySQL".into(), "mysql".into());
        props.insert("SQLite".into(), "sqlite".into());
        provider.set_properties(&props).unwrap();
        assert_eq!(provider.database_id(&ds).unwrap().as_deref(), Some("sqlite"));

        let mut props = Properties::new();
        props.insert("Oracle".into(), "oracle".into());
        provider.set_properties(&props).unwrap();
        assert_eq!(provider.database_id(&ds).unwrap(), None);
    }
}
