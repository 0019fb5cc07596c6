//! Metric names recorded by the engine.
//!
//! Recording goes through the `metrics` facade; installing an exporter is up
//! to the application.

/// Currently attached clients (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Clients attached since start (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Clients torn down since start (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Upgrade attempts refused by admission control (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Dispatched requests, labelled by `method` and `status` (counter).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// Handler latency in seconds, labelled by `method` (histogram).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// Frames the backend could not parse (counter).
pub const RPC_PARSE_ERRORS_TOTAL: &str = "rpc_parse_errors_total";
