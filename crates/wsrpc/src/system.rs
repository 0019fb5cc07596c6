//! `System.*` RPC methods.

use serde_json::Value;
use wsrpc_server::RpcAdapter;

/// System RPC module.
#[derive(Debug, Default)]
pub struct SystemRpc;

impl SystemRpc {
    /// Liveness probe answering `null`.
    pub const PING: &'static str = "System.Ping";

    /// Register the module's methods on `adapter`.
    pub fn register(&self, adapter: &RpcAdapter) {
        adapter.register_fn(Self::PING, |_ctx| async { Ok(Value::Null) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registers_ping() {
        let adapter = RpcAdapter::builder().workers(1).build();
        SystemRpc.register(&adapter);
        assert!(adapter.has_method(SystemRpc::PING));
        assert_eq!(adapter.methods(), vec![SystemRpc::PING.to_string()]);
    }
}
