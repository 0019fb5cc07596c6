//! Per-request bundle handed to method handlers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::ClientError;
use crate::rpc::{ErrorCode, RpcError, RpcRequest, RpcResponse};
use crate::websocket::{Client, Metadata};

/// The originating client and its parsed request.
#[derive(Clone, Debug)]
pub struct Context {
    client: Arc<Client>,
    request: RpcRequest,
}

impl Context {
    /// Pair a request with the client that sent it.
    pub fn new(client: Arc<Client>, request: RpcRequest) -> Self {
        Self { client, request }
    }

    /// Sending client.
    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Parsed request.
    pub fn request(&self) -> &RpcRequest {
        &self.request
    }

    /// Request id.
    pub fn id(&self) -> i64 {
        self.request.id
    }

    /// Method name.
    pub fn method(&self) -> &str {
        &self.request.method
    }

    /// All positional parameters.
    pub fn params(&self) -> &[Value] {
        &self.request.params
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.request.params.get(index)
    }

    /// Parameter at `index`, failing with an insufficient-arguments error when absent.
    pub fn require_param(&self, index: usize) -> Result<&Value, RpcError> {
        self.param(index).ok_or_else(|| {
            RpcError::new(ErrorCode::InsufficientArguments)
                .with_data(format!("missing parameter {index}"))
        })
    }

    /// Parameter at `index` deserialized into `T`.
    pub fn param_as<T: DeserializeOwned>(&self, index: usize) -> Result<T, RpcError> {
        let value = self.require_param(index)?.clone();
        serde_json::from_value(value).map_err(|err| {
            RpcError::new(ErrorCode::InvalidArguments).with_data(format!("parameter {index}: {err}"))
        })
    }

    /// The client's metadata.
    pub fn meta(&self) -> &Metadata {
        self.client.meta()
    }

    /// Send a raw frame to the client.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), ClientError> {
        self.client.send(data).await
    }

    /// Encode and send a reply.
    pub async fn respond(&self, response: &RpcResponse) -> Result<(), ClientError> {
        self.client.respond(response).await
    }

    /// Encode and send a notification.
    pub async fn notify(&self, event: &str, payload: &Value) -> Result<(), ClientError> {
        self.client.notify(event, payload).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::memory_client;
    use crate::websocket::EndpointOptions;

    fn ctx(params: Value) -> Context {
        let (client, _peer) = memory_client(EndpointOptions::default());
        Context::new(client, RpcRequest::new(5, "test", params))
    }

    #[test]
    fn accessors() {
        let ctx = ctx(json!(["a", 2]));
        assert_eq!(ctx.id(), 5);
        assert_eq!(ctx.method(), "test");
        assert_eq!(ctx.params().len(), 2);
        assert_eq!(ctx.param(0), Some(&json!("a")));
        assert!(ctx.param(2).is_none());
    }

    #[test]
    fn require_param_reports_missing_index() {
        let err = ctx(json!([])).require_param(0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientArguments);
    }

    #[test]
    fn param_as_reports_wrong_type() {
        let ctx = ctx(json!(["not a number"]));
        let err = ctx.param_as::<u32>(0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArguments);
        assert_eq!(ctx.param_as::<String>(0).unwrap(), "not a number");
    }

    #[test]
    fn meta_is_the_clients_table() {
        let ctx = ctx(Value::Null);
        ctx.meta().set("k", "v");
        assert_eq!(ctx.client().meta().get_str("k").as_deref(), Some("v"));
    }
}
