//! One upgraded connection and its per-connection state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{BoxStream, Peekable};
use futures::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::Adapter;
use crate::errors::ClientError;
use crate::rpc::RpcResponse;
use crate::websocket::{EndpointOptions, Metadata, Runner};

/// Unique client identifier.
pub type ClientId = Uuid;

/// Inbound half of a connection.
pub type FrameStream = BoxStream<'static, Result<Message, axum::Error>>;

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// A connected peer.
///
/// Open until [`Client::close`], which is terminal. Frames are read one at a
/// time by [`Client::resume`], driven by the endpoint's poller.
pub struct Client {
    id: ClientId,
    options: Arc<EndpointOptions>,
    reader: tokio::sync::Mutex<Peekable<FrameStream>>,
    writer: tokio::sync::Mutex<FrameSink>,
    meta: Metadata,
    runners: Mutex<Vec<Arc<Runner>>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    connected_at: Instant,
}

impl Client {
    /// Wrap an already-upgraded connection split into its two halves.
    pub fn new(options: Arc<EndpointOptions>, stream: FrameStream, sink: FrameSink) -> Self {
        Self {
            id: Uuid::now_v7(),
            options,
            reader: tokio::sync::Mutex::new(stream.peekable()),
            writer: tokio::sync::Mutex::new(sink),
            meta: Metadata::new(),
            runners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// Wrap an axum WebSocket.
    pub fn from_socket(options: Arc<EndpointOptions>, socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self::new(options, stream.boxed(), Box::pin(sink))
    }

    /// Client id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Options of the owning endpoint.
    pub fn options(&self) -> &Arc<EndpointOptions> {
        &self.options
    }

    /// Adapter of the owning endpoint.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.options.adapter
    }

    /// Per-client key/value table.
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// When the client was created.
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Whether [`Client::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Token cancelled when the client closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve once a frame (or end of stream) is pending, without consuming it.
    pub(crate) async fn readable(&self) {
        let mut reader = self.reader.lock().await;
        let _ = Pin::new(&mut *reader).peek().await;
    }

    /// Read exactly one frame and hand it to the adapter.
    ///
    /// A close frame or end of stream yields [`ClientError::ConnectionClosed`].
    pub async fn resume(self: &Arc<Self>) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let frame = self.reader.lock().await.next().await;
        match frame {
            None | Some(Ok(Message::Close(_))) => Err(ClientError::ConnectionClosed),
            Some(Err(err)) => Err(ClientError::Read(err)),
            Some(Ok(Message::Text(text))) => {
                self.options
                    .adapter
                    .handle_message(self, text.as_str().as_bytes())
                    .await?;
                Ok(())
            }
            Some(Ok(Message::Binary(data))) => {
                self.options.adapter.handle_message(self, &data).await?;
                Ok(())
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(()),
        }
    }

    /// Write one frame and flush it.
    ///
    /// UTF-8 payloads go out as text frames, anything else as binary.
    pub async fn send(&self, data: Vec<u8>) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let message = match String::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(err) => Message::Binary(err.into_bytes().into()),
        };
        self.writer
            .lock()
            .await
            .send(message)
            .await
            .map_err(ClientError::Write)
    }

    /// Encode `response` with the endpoint adapter and send it.
    pub async fn respond(&self, response: &RpcResponse) -> Result<(), ClientError> {
        let data = self.options.adapter.prepare_response(response)?;
        self.send(data).await
    }

    /// Encode a notification with the endpoint adapter and send it.
    pub async fn notify(&self, event: &str, payload: &Value) -> Result<(), ClientError> {
        let data = self.options.adapter.prepare_notification(event, payload)?;
        self.send(data).await
    }

    /// Start a background task tied to this client's lifetime.
    ///
    /// The task is stopped by [`Client::release`] or [`Client::close`].
    /// The closed check and the push share the lock [`Client::close`] holds
    /// while setting the flag.
    pub fn create_runner<F, Fut>(&self, task: F) -> Result<Arc<Runner>, ClientError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runner = Arc::new(Runner::new(task));
        let mut runners = self.runners.lock();
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        runner.start();
        runners.push(Arc::clone(&runner));
        Ok(runner)
    }

    /// Number of tracked runners.
    pub fn runner_count(&self) -> usize {
        self.runners.lock().len()
    }

    /// Stop every tracked runner, waiting for each to return.
    pub async fn release(&self) {
        let runners = std::mem::take(&mut *self.runners.lock());
        stop_all(runners).await;
    }

    /// Release runners, then close the connection. Idempotent.
    pub async fn close(&self) {
        let runners = {
            let mut runners = self.runners.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *runners)
        };
        stop_all(runners).await;
        self.cancel.cancel();
        if let Err(err) = self.writer.lock().await.close().await {
            debug!(client_id = %self.id, error = %err, "closing connection failed");
        }
    }
}

async fn stop_all(runners: Vec<Arc<Runner>>) {
    for runner in runners {
        runner.stop().await;
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
