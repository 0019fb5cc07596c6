//! # wsrpc
//!
//! Application wiring for the wsrpc server.
//!
//! - `app::App`: builds the JSON-RPC endpoint from [`wsrpc_settings::Settings`] and serves it
//! - `system::SystemRpc`: `System.*` methods
//! - `health`: `/health` response body
//! - `logging`: global `tracing` subscriber setup
//! - `metrics`: Prometheus recorder for `/metrics`
//! - `shutdown::ShutdownCoordinator`: cancellation token, Ctrl-C, task draining

#![deny(unsafe_code)]

pub mod app;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod system;

pub use app::App;
pub use shutdown::ShutdownCoordinator;
pub use system::SystemRpc;
