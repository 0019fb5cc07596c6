//! In-memory transports and a minimal codec for unit tests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};

use crate::backend::Backend;
use crate::errors::CodecError;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::websocket::{Client, EndpointOptions, FrameSink, FrameStream};

/// Remote side of an in-memory connection.
pub struct Peer {
    inbound: mpsc::UnboundedSender<Result<Message, axum::Error>>,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl Peer {
    pub fn send_text(&self, text: &str) {
        let _ = self.inbound.unbounded_send(Ok(Message::Text(text.to_owned().into())));
    }

    pub fn send_binary(&self, data: Vec<u8>) {
        let _ = self.inbound.unbounded_send(Ok(Message::Binary(data.into())));
    }

    pub fn send_ping(&self) {
        let _ = self.inbound.unbounded_send(Ok(Message::Ping(Vec::new().into())));
    }

    pub fn send_close(&self) {
        let _ = self.inbound.unbounded_send(Ok(Message::Close(None)));
    }

    pub fn send_error(&self, reason: &str) {
        let err = axum::Error::new(std::io::Error::other(reason.to_string()));
        let _ = self.inbound.unbounded_send(Err(err));
    }

    /// Next frame written by the server side, or `None` after a short wait.
    pub async fn next_message(&mut self) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(5), self.outbound.next())
            .await
            .ok()
            .flatten()
    }

    /// Next text frame parsed as JSON.
    pub async fn next_json(&mut self) -> Option<Value> {
        match self.next_message().await? {
            Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
            _ => None,
        }
    }
}

/// Both halves of an in-memory connection.
pub fn memory_transport() -> (FrameStream, FrameSink, Peer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded();
    let (outbound_tx, outbound_rx) = mpsc::unbounded::<Message>();
    let sink: FrameSink = Box::pin(outbound_tx.sink_map_err(axum::Error::new));
    let peer = Peer {
        inbound: inbound_tx,
        outbound: outbound_rx,
    };
    (inbound_rx.boxed(), sink, peer)
}

/// A client wired to an in-memory peer.
pub fn memory_client(options: EndpointOptions) -> (Arc<Client>, Peer) {
    let (stream, sink, peer) = memory_transport();
    let client = Arc::new(Client::new(Arc::new(options), stream, sink));
    (client, peer)
}

/// Minimal JSON codec: `{"id", "method", "params"}` in, `{"id", "result"|"error"}` out.
///
/// Error codes stay on the internal scale.
pub struct TestBackend;

impl Backend for TestBackend {
    fn parse_request(&self, frame: &[u8]) -> Result<RpcRequest, CodecError> {
        let value: Value = serde_json::from_slice(frame)?;
        let id = value["id"].as_i64().unwrap_or_default();
        let method = value["method"].as_str().unwrap_or_default();
        Ok(RpcRequest::new(id, method, value["params"].clone()))
    }

    fn prepare_response(&self, response: &RpcResponse) -> Result<Vec<u8>, CodecError> {
        let body = match &response.outcome {
            Ok(result) => json!({"id": response.id, "result": result}),
            Err(err) => json!({
                "id": response.id,
                "error": {"code": err.code.value(), "message": err.message, "data": err.data},
            }),
        };
        Ok(serde_json::to_vec(&body)?)
    }

    fn prepare_notification(&self, event: &str, payload: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&json!({"event": event, "payload": payload}))?)
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
