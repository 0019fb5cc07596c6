//! RPC layer: requests, errors, handlers, the worker queue and the adapter.

pub mod adapter;
pub mod context;
pub mod errors;
pub mod queue;
pub mod registry;
pub mod types;

pub use adapter::{RpcAdapter, RpcAdapterBuilder};
pub use context::Context;
pub use errors::{ErrorCode, RpcError};
pub use queue::{DEFAULT_DRAIN_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, DispatchFn, RequestQueue};
pub use registry::{FnHandler, MethodHandler, MethodRegistry, from_fn};
pub use types::{RpcRequest, RpcResponse, normalize_params};
