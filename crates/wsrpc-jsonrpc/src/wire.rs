//! Serde shapes of JSON-RPC 2.0 messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version tag written on every outbound message.
pub const VERSION: &str = "2.0";

/// Inbound call. Missing fields default; `params` is normalized later.
#[derive(Debug, Deserialize)]
pub struct WireRequest {
    /// Version tag, not enforced.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Correlation id.
    #[serde(default)]
    pub id: i64,
    /// Method name.
    #[serde(default)]
    pub method: String,
    /// Raw parameters.
    #[serde(default)]
    pub params: Value,
}

/// Successful reply.
#[derive(Debug, Serialize)]
pub struct WireResult<'a> {
    /// Always [`VERSION`].
    pub jsonrpc: &'static str,
    /// Request id.
    pub id: i64,
    /// Handler result, `null` included.
    pub result: &'a Value,
}

/// Failed reply.
#[derive(Debug, Serialize)]
pub struct WireErrorResponse<'a> {
    /// Always [`VERSION`].
    pub jsonrpc: &'static str,
    /// Request id.
    pub id: i64,
    /// Error object.
    pub error: WireError<'a>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct WireError<'a> {
    /// Standard wire code.
    pub code: i32,
    /// Message.
    pub message: &'a str,
    /// Optional detail, omitted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
}

/// Server-initiated message without an id.
#[derive(Debug, Serialize)]
pub struct WireNotification<'a> {
    /// Always [`VERSION`].
    pub jsonrpc: &'static str,
    /// Event name.
    pub method: &'a str,
    /// Payload.
    pub params: &'a Value,
}
