use super::{
    Connection, DataSource, DataSourceFactory, DataSourceOptions, DatabaseType, SqlxConnection,
};
use crate::error::{SqlMapError, SqlMapResult};
use crate::parsing::Properties;
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use async_trait::async_trait;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Data source backed by a `sqlx` pool.
///
/// The pool is created on the first connection request; concurrent first requests share
/// a single creation.
pub struct PooledDataSource {
    options: DataSourceOptions,
    db_type: DatabaseType,
    pool: OnceCell<AnyPool>,
}

impl PooledDataSource {
    pub fn new(options: DataSourceOptions) -> SqlMapResult<Self> {
        options.validate()?;
        let db_type = options.database_type().ok_or_else(|| {
            SqlMapError::connection(
                format!("Unknown database type for: {}", options.masked_url()),
                "Use a postgres://, mysql:// or sqlite: URL",
            )
        })?;
        sqlx::any::install_default_drivers();
        Ok(Self {
            options,
            db_type,
            pool: OnceCell::new(),
        })
    }

    pub fn options(&self) -> &DataSourceOptions {
        &self.options
    }

    /// Whether the pool has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    async fn pool(&self) -> SqlMapResult<&AnyPool> {
        self.pool
            .get_or_try_init(|| async {
                debug!(url = %self.options.masked_url(), "Creating connection pool");
                let url = self.options.connect_url()?;
                let pool = AnyPoolOptions::new()
                    .min_connections(self.options.min_connections_or_default())
                    .max_connections(self.options.max_connections_or_default())
                    .acquire_timeout(self.options.acquire_timeout())
                    .idle_timeout(Some(self.options.idle_timeout()))
                    .test_before_acquire(self.options.test_before_acquire_or_default())
                    .connect(&url)
                    .await
                    .map_err(|e| {
                        SqlMapError::connection(
                            format!("Failed to connect to {}: {}", self.db_type, e),
                            "Check the connection credentials are correct",
                        )
                    })?;
                info!(db_type = %self.db_type, "Connection pool created");
                Ok::<_, SqlMapError>(pool)
            })
            .await
    }
}

#[async_trait]
impl DataSource for PooledDataSource {
    async fn connection(&self) -> SqlMapResult<Box<dyn Connection>> {
        let conn = self.pool().await?.acquire().await?;
        Ok(Box::new(SqlxConnection::pooled(conn, self.db_type)))
    }

    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            info!(db_type = %self.db_type, "Closing connection pool");
            pool.close().await;
        }
    }
}

impl fmt::Debug for PooledDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledDataSource")
            .field("url", &self.options.masked_url())
            .field("db_type", &self.db_type)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Factory registered as `POOLED`.
#[derive(Debug, Default)]
pub struct PooledDataSourceFactory {
    options: Option<DataSourceOptions>,
}

impl PooledDataSourceFactory {
    pub const TYPE_NAME: &'static str = "sqlsession::datasource::PooledDataSourceFactory";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::DataSourceFactory)
            .with_constructor(Constructor::DataSourceFactory(Self::boxed))
    }

    fn boxed() -> Box<dyn DataSourceFactory> {
        Box::new(Self::default())
    }
}

impl DataSourceFactory for PooledDataSourceFactory {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        self.options = Some(DataSourceOptions::from_properties(properties, true)?);
        Ok(())
    }

    fn data_source(&self) -> SqlMapResult<Arc<dyn DataSource>> {
        let options = self.options.clone().ok_or_else(|| {
            SqlMapError::component("DataSource", "the url property is required")
        })?;
        Ok(Arc::new(PooledDataSource::new(options)?))
    }
}
