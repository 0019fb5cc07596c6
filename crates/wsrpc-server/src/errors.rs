//! Error types for the engine's moving parts.

use thiserror::Error;

/// Failures of a single client connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The peer sent a close frame or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,
    /// The client was already closed locally.
    #[error("client is closed")]
    Closed,
    /// Reading a frame failed.
    #[error("frame read failed: {0}")]
    Read(#[source] axum::Error),
    /// Writing or flushing a frame failed.
    #[error("frame write failed: {0}")]
    Write(#[source] axum::Error),
    /// The adapter rejected the frame.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Failures while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The backend has no implementation for this operation.
    #[error("not implemented")]
    NotImplemented,
    /// The frame held no value at all.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// The frame is not valid for the wire format.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures of an [`Adapter`](crate::Adapter).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter has no implementation for this operation.
    #[error("not implemented")]
    NotImplemented,
    /// The backend failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The request queue is shut down.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// A message hook rejected the frame.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Failures of the [`RequestQueue`](crate::rpc::RequestQueue).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was shut down.
    #[error("request queue is closed")]
    Closed,
}

/// Failures of the [`ClientManager`](crate::websocket::ClientManager).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    /// The manager actor has terminated.
    #[error("client manager is closed")]
    Closed,
}

/// Failures of the [`PollerPool`](crate::websocket::PollerPool).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    /// The poll loop has stopped.
    #[error("poller is stopped")]
    Stopped,
    /// The client is already closed and cannot be polled.
    #[error("client {0} is closed")]
    ClientClosed(uuid::Uuid),
}

/// Failures while attaching a connection to an endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Every client slot is taken.
    #[error("endpoint is full ({0} clients)")]
    Full(usize),
    /// Registration with the manager failed.
    #[error(transparent)]
    Manager(#[from] ManagerError),
    /// Registration with the poller failed.
    #[error(transparent)]
    Poller(#[from] PollerError),
}

/// Failures of the [`WebSocketServer`](crate::WebSocketServer) registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    /// Another endpoint is already bound to the URI.
    #[error("endpoint already exists: {0}")]
    DuplicateEndpoint(String),
    /// URIs must be absolute paths.
    #[error("invalid endpoint uri: {0}")]
    InvalidUri(String),
}
