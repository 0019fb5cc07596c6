//! Method handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::rpc::{Context, RpcError};

/// Handles one RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Produce the result for `ctx`, or an error sent back in the response.
    async fn handle(&self, ctx: &Context) -> Result<Value, RpcError>;
}

/// Adapts an async closure into a [`MethodHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    async fn handle(&self, ctx: &Context) -> Result<Value, RpcError> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap `f` as a handler.
pub fn from_fn<F, Fut>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Method name to handler mapping. Safe to mutate while requests dispatch.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl MethodRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `method` to `handler`. The last registration for a name wins.
    pub fn register(&self, method: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        let _ = self.handlers.write().insert(method.into(), handler);
    }

    /// Remove `method`. Returns whether it was bound.
    pub fn unregister(&self, method: &str) -> bool {
        self.handlers.write().remove(method).is_some()
    }

    /// Handler bound to `method`.
    pub fn get(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.read().get(method).cloned()
    }

    /// Whether `method` is bound.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.read().contains_key(method)
    }

    /// Bound method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rpc::RpcRequest;
    use crate::test_support::memory_client;
    use crate::websocket::EndpointOptions;

    struct Constant(Value);

    #[async_trait]
    impl MethodHandler for Constant {
        async fn handle(&self, _ctx: &Context) -> Result<Value, RpcError> {
            Ok(self.0.clone())
        }
    }

    fn ctx() -> Context {
        let (client, _peer) = memory_client(EndpointOptions::default());
        Context::new(client, RpcRequest::new(1, "m", json!(["x"])))
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = MethodRegistry::new();
        registry.register("m", Arc::new(Constant(json!(1))));
        registry.register("m", Arc::new(Constant(json!(2))));

        let handler = registry.get("m").unwrap();
        assert_eq!(handler.handle(&ctx()).await.unwrap(), json!(2));
        assert_eq!(registry.methods(), vec!["m".to_string()]);
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = MethodRegistry::new();
        registry.register("m", Arc::new(Constant(Value::Null)));
        assert!(registry.unregister("m"));
        assert!(!registry.unregister("m"));
        assert!(!registry.has_method("m"));
        assert!(registry.get("m").is_none());
    }

    #[test]
    fn methods_are_sorted() {
        let registry = MethodRegistry::new();
        registry.register("b", Arc::new(Constant(Value::Null)));
        registry.register("a", Arc::new(Constant(Value::Null)));
        assert_eq!(registry.methods(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn closures_work_as_handlers() {
        let handler = from_fn(|ctx: Context| async move { Ok(ctx.param(0).cloned().unwrap_or_default()) });
        assert_eq!(handler.handle(&ctx()).await.unwrap(), json!("x"));
    }
}
