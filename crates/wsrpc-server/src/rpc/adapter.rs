//! Adapter that parses frames into calls and runs them on a worker pool.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::adapter::Adapter;
use crate::backend::{Backend, UnimplementedBackend};
use crate::errors::AdapterError;
use crate::metrics::{RPC_PARSE_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::rpc::registry::{MethodRegistry, from_fn};
use crate::rpc::{
    Context, DEFAULT_DRAIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, ErrorCode, MethodHandler, RequestQueue,
    RpcError, RpcResponse,
};
use crate::websocket::Client;

/// Handlers slower than this are logged.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(5);

/// Configures an [`RpcAdapter`].
pub struct RpcAdapterBuilder {
    backend: Arc<dyn Backend>,
    workers: usize,
    queue_capacity: usize,
    handler_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl Default for RpcAdapterBuilder {
    fn default() -> Self {
        Self {
            backend: Arc::new(UnimplementedBackend),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            handler_timeout: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl RpcAdapterBuilder {
    /// Wire codec.
    #[must_use]
    pub fn backend(mut self, backend: impl Backend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    /// Worker count.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Request queue capacity.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Upper bound on a single handler call. Unbounded when `None`.
    #[must_use]
    pub fn handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// How long shutdown waits for running handlers before aborting them.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Build the adapter and start its workers on the current runtime.
    pub fn build(self) -> RpcAdapter {
        let dispatcher = Arc::new(Dispatcher {
            backend: self.backend,
            methods: MethodRegistry::new(),
            handler_timeout: self.handler_timeout,
        });
        let queue =
            RequestQueue::new(self.workers, self.queue_capacity).with_drain_timeout(self.drain_timeout);
        let worker_dispatcher = Arc::clone(&dispatcher);
        queue.consume(Arc::new(move |ctx: Context| {
            let dispatcher = Arc::clone(&worker_dispatcher);
            async move { dispatcher.dispatch(ctx).await }.boxed()
        }));
        RpcAdapter { dispatcher, queue }
    }
}

/// RPC adapter: backend codec, method registry and request queue.
///
/// Inbound frames are parsed on the caller's task and queued; workers look up
/// the method, run the handler and always answer, error or not. Frames that
/// fail to parse are reported to the caller instead of being answered.
pub struct RpcAdapter {
    dispatcher: Arc<Dispatcher>,
    queue: RequestQueue,
}

impl RpcAdapter {
    /// Builder with default workers and capacity and no codec.
    pub fn builder() -> RpcAdapterBuilder {
        RpcAdapterBuilder::default()
    }

    /// Adapter using `backend` with default settings.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::builder().backend(backend).build()
    }

    /// Bind `method` to `handler`, replacing any previous binding.
    pub fn register(&self, method: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.dispatcher.methods.register(method, handler);
    }

    /// Bind `method` to an async closure.
    pub fn register_fn<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        self.register(method, from_fn(f));
    }

    /// Remove `method`. Returns whether it was bound.
    pub fn unregister(&self, method: &str) -> bool {
        self.dispatcher.methods.unregister(method)
    }

    /// Whether `method` is bound.
    pub fn has_method(&self, method: &str) -> bool {
        self.dispatcher.methods.has_method(method)
    }

    /// Bound method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        self.dispatcher.methods.methods()
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.queue.size()
    }

    /// Wire codec.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.dispatcher.backend
    }
}

#[async_trait]
impl Adapter for RpcAdapter {
    async fn handle_message(&self, client: &Arc<Client>, frame: &[u8]) -> Result<(), AdapterError> {
        let request = self.dispatcher.backend.parse_request(frame).inspect_err(|err| {
            counter!(RPC_PARSE_ERRORS_TOTAL).increment(1);
            debug!(client_id = %client.id(), error = %err, "unparsable frame");
        })?;
        self.queue
            .push(Context::new(Arc::clone(client), request))
            .await?;
        Ok(())
    }

    fn prepare_response(&self, response: &RpcResponse) -> Result<Vec<u8>, AdapterError> {
        Ok(self.dispatcher.backend.prepare_response(response)?)
    }

    fn prepare_notification(&self, event: &str, payload: &Value) -> Result<Vec<u8>, AdapterError> {
        Ok(self.dispatcher.backend.prepare_notification(event, payload)?)
    }

    async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

struct Dispatcher {
    backend: Arc<dyn Backend>,
    methods: MethodRegistry,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    #[instrument(skip_all, fields(client_id = %ctx.client().id(), method = %ctx.method(), request_id = ctx.id()))]
    async fn dispatch(&self, ctx: Context) {
        let response = self.invoke(&ctx).await;
        let data = match self.backend.prepare_response(&response) {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, "failed to encode response");
                return;
            }
        };
        if let Err(err) = ctx.send(data).await {
            debug!(error = %err, "failed to send response");
        }
    }

    async fn invoke(&self, ctx: &Context) -> RpcResponse {
        let Some(handler) = self.methods.get(ctx.method()) else {
            counter!(RPC_REQUESTS_TOTAL, "method" => "unknown", "status" => "not_found").increment(1);
            debug!("method not found");
            return RpcResponse::error(ctx.id(), RpcError::new(ErrorCode::NotFound));
        };

        let start = Instant::now();
        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, handler.handle(ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis(), "handler timed out");
                    Err(RpcError::new(ErrorCode::InternalError)
                        .with_data(format!("handler timed out after {}ms", limit.as_millis())))
                }
            },
            None => handler.handle(ctx).await,
        };
        let elapsed = start.elapsed();

        let method = ctx.method().to_owned();
        let status = if outcome.is_ok() { "ok" } else { "error" };
        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone(), "status" => status).increment(1);
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method).record(elapsed.as_secs_f64());
        if elapsed > SLOW_REQUEST_THRESHOLD {
            warn!(duration_ms = elapsed.as_millis(), "slow request");
        }
        if let Err(err) = &outcome {
            debug!(code = err.code.value(), error = %err, "handler returned error");
        }

        RpcResponse {
            id: ctx.id(),
            outcome,
        }
    }
}
