//! # wsrpc-jsonrpc
//!
//! JSON-RPC 2.0 [`Backend`](wsrpc_server::Backend) for the wsrpc engine.
//!
//! - Requests: `{"jsonrpc":"2.0","id":<int>,"method":"...","params":<any>}`
//! - Results: `{"jsonrpc":"2.0","id":<int>,"result":<any>}`
//! - Errors: `{"jsonrpc":"2.0","id":<int>,"error":{"code":<int>,"message":"...","data":<any>}}`
//! - Notifications: `{"jsonrpc":"2.0","method":"...","params":<any>}`, never an id

#![deny(unsafe_code)]

pub mod backend;
pub mod codes;
pub mod wire;

pub use backend::JsonRpc;
pub use codes::wire_code;
