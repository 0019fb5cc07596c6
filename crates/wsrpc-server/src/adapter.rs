//! Adapter seam between a client's frames and the application.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AdapterError;
use crate::rpc::RpcResponse;
use crate::websocket::Client;

/// Turns inbound frames into work and outbound values into frames.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Handle one inbound frame read from `client`.
    ///
    /// Called on the poll loop; implementations must hand work off quickly.
    /// An error is fatal for the connection.
    async fn handle_message(&self, client: &Arc<Client>, frame: &[u8]) -> Result<(), AdapterError>;

    /// Encode a reply for sending.
    fn prepare_response(&self, response: &RpcResponse) -> Result<Vec<u8>, AdapterError>;

    /// Encode a server-initiated notification for sending.
    fn prepare_notification(&self, event: &str, payload: &Value) -> Result<Vec<u8>, AdapterError>;

    /// Stop background work owned by the adapter.
    async fn shutdown(&self) {}
}

/// Default adapter: forwards raw frames to the endpoint's `on_message` hook.
///
/// It has no codec, so preparing replies or notifications fails with
/// [`AdapterError::NotImplemented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageAdapter;

#[async_trait]
impl Adapter for MessageAdapter {
    async fn handle_message(&self, client: &Arc<Client>, frame: &[u8]) -> Result<(), AdapterError> {
        (client.options().on_message)(client, frame)
    }

    fn prepare_response(&self, _response: &RpcResponse) -> Result<Vec<u8>, AdapterError> {
        Err(AdapterError::NotImplemented)
    }

    fn prepare_notification(&self, _event: &str, _payload: &Value) -> Result<Vec<u8>, AdapterError> {
        Err(AdapterError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;

    use super::*;
    use crate::test_support::memory_client;
    use crate::websocket::EndpointOptions;

    #[tokio::test]
    async fn message_adapter_calls_on_message_hook() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let options = EndpointOptions::default().on_message(move |_client, frame| {
            let _ = counter.fetch_add(frame.len(), Ordering::SeqCst);
            Ok(())
        });
        let (client, _peer) = memory_client(options);

        MessageAdapter.handle_message(&client, b"hello").await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn message_adapter_cannot_prepare() {
        assert_matches!(
            MessageAdapter.prepare_response(&RpcResponse::result(1, Value::Null)),
            Err(AdapterError::NotImplemented)
        );
        assert_matches!(
            MessageAdapter.prepare_notification("x", &Value::Null),
            Err(AdapterError::NotImplemented)
        );
    }
}
