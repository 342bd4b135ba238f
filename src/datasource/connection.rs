use super::{Connection, DatabaseType, IsolationLevel};
use crate::error::{SqlMapError, SqlMapResult};
use async_trait::async_trait;
use sqlx::AnyConnection;
use sqlx::pool::PoolConnection;
use sqlx::Any;
use std::fmt;
use tracing::{debug, warn};

enum Handle {
    Pooled(PoolConnection<Any>),
    Direct(AnyConnection),
}

/// [`Connection`] over a `sqlx` connection using the `Any` driver.
///
/// With auto-commit off, `BEGIN` is issued lazily before the first statement of each
/// unit of work; `commit` and `rollback` end it.
///
/// A pooled connection must go back to the pool the way it came out: `close` rolls back
/// an open unit of work and restores the server's default isolation level. If the
/// connection is dropped without `close` while either is pending, the pooled handle is
/// closed instead of being returned.
pub struct SqlxConnection {
    handle: Option<Handle>,
    db_type: DatabaseType,
    auto_commit: bool,
    in_transaction: bool,
    isolation_changed: bool,
}

impl SqlxConnection {
    pub fn pooled(conn: PoolConnection<Any>, db_type: DatabaseType) -> Self {
        Self::new(Handle::Pooled(conn), db_type)
    }

    pub fn direct(conn: AnyConnection, db_type: DatabaseType) -> Self {
        Self::new(Handle::Direct(conn), db_type)
    }

    fn new(handle: Handle, db_type: DatabaseType) -> Self {
        Self {
            handle: Some(handle),
            db_type,
            auto_commit: true,
            in_transaction: false,
            isolation_changed: false,
        }
    }

    /// Whether a unit of work is currently open on the server.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Whether a non-default isolation level is still set on the session.
    pub fn isolation_changed(&self) -> bool {
        self.isolation_changed
    }

    fn raw(&mut self) -> SqlMapResult<&mut AnyConnection> {
        match &mut self.handle {
            Some(Handle::Pooled(conn)) => Ok(&mut **conn),
            Some(Handle::Direct(conn)) => Ok(conn),
            None => Err(SqlMapError::transaction("Connection is already closed")),
        }
    }

    async fn run(&mut self, sql: &str) -> SqlMapResult<u64> {
        let result = sqlx::Executor::execute(self.raw()?, sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }

    async fn begin_if_needed(&mut self) -> SqlMapResult<()> {
        if !self.auto_commit && !self.in_transaction {
            self.run("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn finish(&mut self, statement: &str) -> SqlMapResult<()> {
        if self.in_transaction {
            self.in_transaction = false;
            self.run(statement).await?;
        }
        Ok(())
    }

    fn isolation_sql(&self, level: IsolationLevel) -> SqlMapResult<String> {
        let name = level.sql_name().ok_or_else(|| {
            SqlMapError::transaction(format!(
                "Isolation level {} is not supported by {}",
                level, self.db_type
            ))
        })?;
        Ok(match self.db_type {
            DatabaseType::PostgreSQL => format!(
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}",
                name
            ),
            DatabaseType::MySQL => format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", name),
            DatabaseType::SQLite => {
                let flag = u8::from(level == IsolationLevel::ReadUncommitted);
                format!("PRAGMA read_uncommitted = {}", flag)
            }
        })
    }

    /// Statement that puts the session back on the server's default isolation level.
    fn isolation_reset_sql(&self) -> &'static str {
        match self.db_type {
            DatabaseType::PostgreSQL => "RESET default_transaction_isolation",
            DatabaseType::MySQL => {
                "SET SESSION transaction_isolation = @@GLOBAL.transaction_isolation"
            }
            DatabaseType::SQLite => "PRAGMA read_uncommitted = 0",
        }
    }

    /// Undo per-session state so the connection is clean for its next user.
    /// Returns false if some state could not be undone.
    async fn restore(&mut self) -> bool {
        let mut clean = true;
        if self.in_transaction {
            self.in_transaction = false;
            if let Err(e) = self.run("ROLLBACK").await {
                warn!(error = %e, "Failed to roll back open unit of work before release");
                clean = false;
            }
        }
        if self.isolation_changed {
            let sql = self.isolation_reset_sql();
            match self.run(sql).await {
                Ok(_) => self.isolation_changed = false,
                Err(e) => {
                    warn!(error = %e, "Failed to restore default isolation level before release");
                    clean = false;
                }
            }
        }
        clean
    }
}

#[async_trait]
impl Connection for SqlxConnection {
    fn auto_commit(&self) -> SqlMapResult<bool> {
        Ok(self.auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> SqlMapResult<()> {
        if self.auto_commit == auto_commit {
            return Ok(());
        }
        if auto_commit {
            // Leaving manual mode never publishes unfinished work.
            self.finish("ROLLBACK").await?;
        }
        self.auto_commit = auto_commit;
        debug!(db_type = %self.db_type, auto_commit, "Changed auto-commit");
        Ok(())
    }

    async fn set_isolation_level(&mut self, level: IsolationLevel) -> SqlMapResult<()> {
        let sql = self.isolation_sql(level)?;
        self.run(&sql).await?;
        self.isolation_changed = true;
        debug!(db_type = %self.db_type, isolation = %level, "Set isolation level");
        Ok(())
    }

    async fn commit(&mut self) -> SqlMapResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> SqlMapResult<()> {
        self.finish("ROLLBACK").await
    }

    async fn execute(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.begin_if_needed().await?;
        self.run(sql).await
    }

    async fn close(mut self: Box<Self>) -> SqlMapResult<()> {
        let clean = self.restore().await;
        match self.handle.take() {
            Some(Handle::Pooled(mut conn)) => {
                if !clean {
                    conn.close_on_drop();
                }
                drop(conn);
                Ok(())
            }
            Some(Handle::Direct(conn)) => {
                sqlx::Connection::close(conn).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn database_type(&self) -> DatabaseType {
        self.db_type
    }
}

impl fmt::Debug for SqlxConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handle {
            Some(Handle::Pooled(_)) => "pooled",
            Some(Handle::Direct(_)) => "direct",
            None => "closed",
        };
        f.debug_struct("SqlxConnection")
            .field("kind", &kind)
            .field("db_type", &self.db_type)
            .field("auto_commit", &self.auto_commit)
            .field("in_transaction", &self.in_transaction)
            .field("isolation_changed", &self.isolation_changed)
            .finish()
    }
}

impl Drop for SqlxConnection {
    fn drop(&mut self) {
        if !self.in_transaction && !self.isolation_changed {
            return;
        }
        // Dropped without close: never hand session state back to the pool.
        if let Some(Handle::Pooled(conn)) = &mut self.handle {
            warn!(
                db_type = %self.db_type,
                in_transaction = self.in_transaction,
                "Connection dropped without close, discarding it from the pool"
            );
            conn.close_on_drop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::any::AnyPoolOptions;

    async fn single_connection_pool() -> sqlx::AnyPool {
        sqlx::any::install_default_drivers();
        AnyPoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn read_uncommitted(pool: &sqlx::AnyPool) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query_scalar("PRAGMA read_uncommitted")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_close_restores_default_isolation() {
        let pool = single_connection_pool().await;

        let mut conn = Box::new(SqlxConnection::pooled(
            pool.acquire().await.unwrap(),
            DatabaseType::SQLite,
        ));
        conn.set_isolation_level(IsolationLevel::ReadUncommitted)
            .await
            .unwrap();
        assert!(conn.isolation_changed());
        conn.close().await.unwrap();

        assert_eq!(read_uncommitted(&pool).await, 0);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_close_rolls_back_open_unit_of_work() {
        let pool = single_connection_pool().await;

        let mut conn = Box::new(SqlxConnection::pooled(
            pool.acquire().await.unwrap(),
            DatabaseType::SQLite,
        ));
        conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        conn.set_auto_commit(false).await.unwrap();
        conn.execute("INSERT INTO t VALUES (1)").await.unwrap();
        assert!(conn.in_transaction());
        conn.close().await.unwrap();

        let mut raw = pool.acquire().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&mut *raw)
            .await
            .unwrap();
        assert_eq!(count, 0);
        drop(raw);
        pool.close().await;
    }
}
