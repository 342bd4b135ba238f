//! Interceptors wrapping executors.
//!
//! Interceptors are applied in declaration order, so the last one declared ends up as the
//! outermost wrapper and sees every call first.

use crate::cache::{PerpetualCache, TransactionalCaches};
use crate::error::{SqlMapError, SqlMapResult};
use crate::executor::{Executor, ExecutorType};
use crate::parsing::Properties;
use crate::transaction::Transaction;
use crate::types::{Constructor, TypeDescriptor, TypeKind};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub trait Interceptor: Send + Sync {
    /// Apply the `<property>` children declared with the plugin.
    fn set_properties(&mut self, _properties: &Properties) -> SqlMapResult<()> {
        Ok(())
    }

    /// Wrap `executor`, or hand it back unchanged.
    ///
    /// A refusal returns the executor inside [`PluginRejected`] so the caller can close it.
    fn plugin(&self, executor: Box<dyn Executor>) -> Result<Box<dyn Executor>, PluginRejected>;
}

/// An interceptor refused to wrap an executor.
pub struct PluginRejected {
    pub error: SqlMapError,
    /// The executor as it was handed to the refusing interceptor.
    pub executor: Box<dyn Executor>,
}

impl PluginRejected {
    pub fn new(error: SqlMapError, executor: Box<dyn Executor>) -> Self {
        Self { error, executor }
    }
}

impl fmt::Debug for PluginRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRejected")
            .field("error", &self.error)
            .field("executor", &self.executor)
            .finish()
    }
}

/// Ordered list of configured interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Wrap `executor` with every interceptor, first declared innermost.
    pub fn plugin_all(
        &self,
        executor: Box<dyn Executor>,
    ) -> Result<Box<dyn Executor>, PluginRejected> {
        self.interceptors
            .iter()
            .try_fold(executor, |target, interceptor| interceptor.plugin(target))
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// Interceptor emitting a debug event with the elapsed time of every update, commit
/// and rollback.
///
/// Accepts one property, `name`, used as the `interceptor` field of the events.
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    name: String,
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self {
            name: "tracing".to_string(),
        }
    }
}

impl TracingInterceptor {
    pub const TYPE_NAME: &'static str = "sqlsession::plugin::TracingInterceptor";

    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::new(Self::TYPE_NAME, TypeKind::Interceptor)
            .with_constructor(Constructor::Interceptor(Self::boxed))
    }

    fn boxed() -> Box<dyn Interceptor> {
        Box::new(Self::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Interceptor for TracingInterceptor {
    fn set_properties(&mut self, properties: &Properties) -> SqlMapResult<()> {
        for (key, value) in properties {
            match key.as_str() {
                "name" => self.name = value.clone(),
                other => {
                    return Err(SqlMapError::component(
                        Self::TYPE_NAME,
                        format!("Unknown property: {}", other),
                    ));
                }
            }
        }
        Ok(())
    }

    fn plugin(&self, executor: Box<dyn Executor>) -> Result<Box<dyn Executor>, PluginRejected> {
        Ok(Box::new(TracedExecutor {
            name: self.name.clone(),
            inner: executor,
        }))
    }
}

struct TracedExecutor {
    name: String,
    inner: Box<dyn Executor>,
}

#[async_trait]
impl Executor for TracedExecutor {
    fn executor_type(&self) -> ExecutorType {
        self.inner.executor_type()
    }

    fn transaction(&mut self) -> SqlMapResult<&mut dyn Transaction> {
        self.inner.transaction()
    }

    fn local_cache(&self) -> &PerpetualCache {
        self.inner.local_cache()
    }

    async fn update(&mut self, sql: &str) -> SqlMapResult<u64> {
        let start = Instant::now();
        let result = self.inner.update(sql).await;
        debug!(
            interceptor = %self.name,
            sql = %sql,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "update"
        );
        result
    }

    async fn commit(&mut self, required: bool) -> SqlMapResult<()> {
        let start = Instant::now();
        let result = self.inner.commit(required).await;
        debug!(
            interceptor = %self.name,
            required,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "commit"
        );
        result
    }

    async fn rollback(&mut self, required: bool) -> SqlMapResult<()> {
        let start = Instant::now();
        let result = self.inner.rollback(required).await;
        debug!(
            interceptor = %self.name,
            required,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "rollback"
        );
        result
    }

    async fn close(&mut self, force_rollback: bool) {
        self.inner.close(force_rollback).await;
        debug!(interceptor = %self.name, force_rollback, "close");
    }

    fn clear_local_cache(&mut self) {
        self.inner.clear_local_cache();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn transactional_caches(&mut self) -> Option<&mut TransactionalCaches> {
        self.inner.transactional_caches()
    }
}

impl fmt::Debug for TracedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedExecutor")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BaseExecutor;
    use crate::transaction::ManagedTransaction;
    use std::sync::Mutex;

    /// Records the order in which it was asked to wrap.
    struct Recorder {
        label: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Interceptor for Recorder {
        fn plugin(
            &self,
            executor: Box<dyn Executor>,
        ) -> Result<Box<dyn Executor>, PluginRejected> {
            self.seen.lock().unwrap().push(self.label);
            if self.label == "refuse" {
                return Err(PluginRejected::new(
                    SqlMapError::component("Recorder", "refused"),
                    executor,
                ));
            }
            Ok(executor)
        }
    }

    fn executor() -> Box<dyn Executor> {
        Box::new(BaseExecutor::new(
            Box::new(ManagedTransaction::new(None, None, true)),
            ExecutorType::Simple,
        ))
    }

    #[test]
    fn test_plugin_all_applies_in_declaration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for label in ["first", "second", "third"] {
            chain.add(Arc::new(Recorder {
                label,
                seen: seen.clone(),
            }));
        }
        chain.plugin_all(executor()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_refusal_stops_chain_and_returns_executor() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for label in ["first", "refuse", "never"] {
            chain.add(Arc::new(Recorder {
                label,
                seen: seen.clone(),
            }));
        }
        let rejected = chain.plugin_all(executor()).unwrap_err();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "refuse"]);
        assert!(!rejected.executor.is_closed());
        assert!(rejected.error.to_string().contains("refused"));
    }

    #[test]
    fn test_last_declared_is_outermost() {
        let mut chain = InterceptorChain::new();
        for name in ["inner", "outer"] {
            let mut interceptor = TracingInterceptor::default();
            let mut props = Properties::new();
            props.insert("name".into(), name.into());
            interceptor.set_properties(&props).unwrap();
            chain.add(Arc::new(interceptor));
        }
        let wrapped = chain.plugin_all(executor()).unwrap();
        let debug = format!("{:?}", wrapped);
        let outer = debug.find("\"outer\"").unwrap();
        let inner = debug.find("\"inner\"").unwrap();
        assert!(outer < inner);
    }

    #[test]
    fn test_tracing_interceptor_rejects_unknown_property() {
        let mut props = Properties::new();
        props.insert("colour".into(), "red".into());
        let err = TracingInterceptor::default()
            .set_properties(&props)
            .unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[tokio::test]
    async fn test_traced_executor_delegates() {
        let chain = {
            let mut chain = InterceptorChain::new();
            chain.add(Arc::new(TracingInterceptor::default()));
            chain
        };
        let mut exec = chain.plugin_all(executor()).unwrap();
        exec.commit(true).await.unwrap();
        exec.close(false).await;
        assert!(exec.is_closed());
    }
}
