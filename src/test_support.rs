//! In-memory connection doubles that record the calls made on them.

use crate::datasource::{Connection, DataSource, DatabaseType, IsolationLevel};
use crate::error::{SqlMapError, SqlMapResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

#[derive(Debug)]
pub struct RecordingConnection {
    pub log: CallLog,
    pub auto_commit: bool,
    pub fail_auto_commit_query: bool,
    pub fail_auto_commit_reset: bool,
    pub fail_close: bool,
}

impl RecordingConnection {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            auto_commit: true,
            fail_auto_commit_query: false,
            fail_auto_commit_reset: false,
            fail_close: false,
        }
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn auto_commit(&self) -> SqlMapResult<bool> {
        if self.fail_auto_commit_query {
            return Err(SqlMapError::database("auto-commit unsupported", None, ""));
        }
        Ok(self.auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> SqlMapResult<()> {
        self.log.push(format!("set_auto_commit({})", auto_commit));
        if auto_commit && self.fail_auto_commit_reset {
            return Err(SqlMapError::database("reset refused", None, ""));
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    async fn set_isolation_level(&mut self, level: IsolationLevel) -> SqlMapResult<()> {
        self.log.push(format!("set_isolation_level({})", level));
        Ok(())
    }

    async fn commit(&mut self) -> SqlMapResult<()> {
        self.log.push("commit");
        Ok(())
    }

    async fn rollback(&mut self) -> SqlMapResult<()> {
        self.log.push("rollback");
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> SqlMapResult<u64> {
        self.log.push(format!("execute({})", sql));
        Ok(0)
    }

    async fn close(self: Box<Self>) -> SqlMapResult<()> {
        self.log.push("close");
        if self.fail_close {
            return Err(SqlMapError::connection("close failed", ""));
        }
        Ok(())
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDataSource {
    pub log: CallLog,
    pub fail_connect: bool,
    pub fail_auto_commit_reset: bool,
}

impl RecordingDataSource {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_connect: false,
            fail_auto_commit_reset: false,
        }
    }
}

#[async_trait]
impl DataSource for RecordingDataSource {
    async fn connection(&self) -> SqlMapResult<Box<dyn Connection>> {
        self.log.push("connect");
        if self.fail_connect {
            return Err(SqlMapError::connection("refused", "start the server"));
        }
        let mut conn = RecordingConnection::new(self.log.clone());
        conn.fail_auto_commit_reset = self.fail_auto_commit_reset;
        Ok(Box::new(conn))
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}
