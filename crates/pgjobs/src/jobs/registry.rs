use serde_json::Value;
use std::{collections::HashMap, pin::Pin, sync::Arc};

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

type HandlerFn = dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// Explicit task-name -> handler map, populated at startup.
///
/// Task names are hierarchical dotted strings ("emails.welcome.send"); lookup
/// is exact. Topic patterns only exist on the consume side — by the time a
/// job reaches a worker it carries a concrete task name.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<HandlerFn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, task: &str, handler: F)
    where
        F: Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        self.handlers.insert(task.to_string(), Arc::new(handler));
    }

    pub fn handler_for(&self, task: &str) -> Option<Arc<HandlerFn>> {
        self.handlers.get(task).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Convenience for registering `async fn`-shaped closures.
pub fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
