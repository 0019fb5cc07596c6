//! # wsrpc-server
//!
//! WebSocket RPC engine for the wsrpc workspace.
//!
//! - `websocket::PollerPool`: readiness loop reporting which clients have a pending frame
//! - `websocket::ClientManager`: actor owning the authoritative set of live clients
//! - `websocket::Client`: one upgraded connection, its metadata and background runners
//! - `rpc::RequestQueue`: fixed worker pool draining a bounded queue of request contexts
//! - `rpc::RpcAdapter`: method registry + backend codec + request queue
//! - `websocket::Endpoint`: URI binding, admission control, teardown wiring
//! - `server::WebSocketServer`: endpoint registry producing an axum router

#![deny(unsafe_code)]

pub mod adapter;
pub mod backend;
pub mod errors;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{Adapter, MessageAdapter};
pub use backend::{Backend, UnimplementedBackend};
pub use rpc::{Context, ErrorCode, MethodHandler, RpcAdapter, RpcError, RpcRequest, RpcResponse};
pub use server::WebSocketServer;
pub use websocket::{Client, ClientId, Endpoint, EndpointOptions, Metadata, Runner};
