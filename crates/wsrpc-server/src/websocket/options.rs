//! Per-endpoint configuration shared by every client of the endpoint.

use std::sync::Arc;

use crate::adapter::{Adapter, MessageAdapter};
use crate::errors::AdapterError;
use crate::websocket::Client;

/// Default admission limit per endpoint.
pub const DEFAULT_MAX_CLIENTS: usize = 4096;

/// Default largest accepted inbound message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Callback fired when a client attaches or is torn down.
pub type ClientHook = Arc<dyn Fn(&Arc<Client>) + Send + Sync>;

/// Callback receiving raw frames when the default [`MessageAdapter`] is used.
pub type MessageHook = Arc<dyn Fn(&Arc<Client>, &[u8]) -> Result<(), AdapterError> + Send + Sync>;

/// Endpoint configuration.
#[derive(Clone)]
pub struct EndpointOptions {
    /// Adapter handling inbound frames.
    pub adapter: Arc<dyn Adapter>,
    /// Live clients allowed before upgrades are refused.
    pub max_clients: usize,
    /// Largest inbound message accepted at the upgrade.
    pub max_message_size: usize,
    /// Fired after a client is registered.
    pub on_connected: ClientHook,
    /// Fired once after a client is torn down.
    pub on_disconnected: ClientHook,
    /// Raw frame hook used by [`MessageAdapter`].
    pub on_message: MessageHook,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            adapter: Arc::new(MessageAdapter),
            max_clients: DEFAULT_MAX_CLIENTS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            on_connected: Arc::new(|_: &Arc<Client>| {}),
            on_disconnected: Arc::new(|_: &Arc<Client>| {}),
            on_message: Arc::new(|_: &Arc<Client>, _: &[u8]| Ok(())),
        }
    }
}

impl EndpointOptions {
    /// Use `adapter` for inbound frames.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Set the admission limit.
    #[must_use]
    pub fn max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Set the largest accepted inbound message.
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the connect hook.
    #[must_use]
    pub fn on_connected(mut self, hook: impl Fn(&Arc<Client>) + Send + Sync + 'static) -> Self {
        self.on_connected = Arc::new(hook);
        self
    }

    /// Set the disconnect hook.
    #[must_use]
    pub fn on_disconnected(mut self, hook: impl Fn(&Arc<Client>) + Send + Sync + 'static) -> Self {
        self.on_disconnected = Arc::new(hook);
        self
    }

    /// Set the raw frame hook.
    #[must_use]
    pub fn on_message(
        mut self,
        hook: impl Fn(&Arc<Client>, &[u8]) -> Result<(), AdapterError> + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Arc::new(hook);
        self
    }
}

impl std::fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("max_clients", &self.max_clients)
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}
