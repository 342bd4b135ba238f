use super::{
    Connection, DataSource, DataSourceFactory, DataSourceOptions, DatabaseType, SqlxConnection,
};
use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::Properties;
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use async_trait::async_trait;
use sqlx::AnyConnection;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Data source that opens a new physical connection for every request.
pub struct UnpooledDataSource {
    options: DataSourceOptions,
    db_type: DatabaseType,
}

impl UnpooledDataSource {
    pub fn new(options: DataSourceOptions) -> SqlMapResult<Self> {
        options.validate()?;
        let db_type = options.database_type().ok_or_else(|| {
            SqlMapError::connection(
                format!("Unknown database type for: {}", options.masked_url()),
                "Use a postgres://, mysql:// or sqlite: URL",
            )
        })?;
        sqlx::any::install_default_drivers();
        Ok(Self { options, db_type })
    }
}

#[async_trait]
impl DataSource for UnpooledDataSource {
    async fn connection(&self) -> SqlMapResult<Box<dyn Connection>> {
        let url = self.options.connect_url()?;
        debug!(url = %self.options.masked_url(), "Opening unpooled connection");
        let conn = <AnyConnection as sqlx::Connection>::connect(&url)
            .await
            .map_err(|e| {
                SqlMapError::connection(
                    format!("Failed to connect to {}: {}", self.db_type, e),
                    "Check the connection credentials are correct",
                )
            })?;
        Ok(Box::new(SqlxConnection::direct(conn, self.db_type)))
    }

    fn database_type(&self) -> DatabaseType {
        self.db_type
    }
}

impl fmt::Debug for UnpooledDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpooledDataSource")
            .field("url", &self.options.masked_url())
            .field("db_type", &self.db_type)
            .finish()
    }
}

/// Factory registered as `UNPOOLED`.
#[derive(Debug, Default)]
pub struct UnpooledDataSourceFactory {
    options: Option<DataSourceOptions>,
}

impl UnpooledDataSourceFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::datasource::UnpooledDataSourceFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::DataSourceFactory)
            .with_constructor(Constructor::DataSourceFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn DataSourceFactory> {
        Box::new(Self::default())
    }
}

impl DataSourceFactory for UnpooledDataSourceFactory {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        self.options = Some(DataSourceOptions::from_properties(properties, false)?);
        Ok(())
    }

    fn data_source(&self) -> SqlMapResult<Arc<dyn DataSource>> {
        let options = self.options.clone().ok_or_else(|| {
            SqlMapError::component("DataSource", "the url property is required")
        })?;
        Ok(Arc::new(UnpooledDataSource::new(options)?))
    }
}
