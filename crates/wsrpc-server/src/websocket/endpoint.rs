//! One URI bound to one pool of clients.
//!
//! Upgrade requests pass admission control and become [`Client`]s registered
//! with both the [`ClientManager`] and the [`PollerPool`]. The poller's batch
//! callback reads one frame per ready client; any failure tears the client
//! down in a fixed order: close, remove from poller, unregister from manager,
//! fire `on_disconnected`.
//!
//! Admission reserves one of `max_clients` slots before the handshake. The
//! slot follows the client and is returned when it is torn down, or as soon as
//! the attempt fails at any step before registration completes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::header::CONNECTION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::FutureExt;
use metrics::{counter, gauge};
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::errors::{ClientError, EndpointError};
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::websocket::{
    Client, ClientManager, EndpointOptions, FrameSink, FrameStream, PollerPool, ReadyCallback,
};

/// A bound URI with its clients, poller and adapter.
pub struct Endpoint {
    uri: String,
    options: Arc<EndpointOptions>,
    manager: ClientManager,
    poller: Arc<PollerPool>,
    slots: Arc<Slots>,
    teardown: Teardown,
    span: Span,
}

impl Endpoint {
    /// Create the endpoint and start its manager and poller on the current runtime.
    pub fn new(uri: impl Into<String>, options: EndpointOptions) -> Arc<Self> {
        let uri = uri.into();
        let span = info_span!("endpoint", uri = %uri);
        let options = Arc::new(options);
        let (manager, poller) = span.in_scope(|| (ClientManager::new(), Arc::new(PollerPool::new())));
        let slots = Arc::new(Slots::new(options.max_clients));
        let teardown = Teardown {
            uri: uri.clone(),
            manager: manager.clone(),
            poller: Arc::downgrade(&poller),
            slots: Arc::clone(&slots),
            options: Arc::clone(&options),
        };
        poller.wait(teardown.ready_callback());

        Arc::new(Self {
            uri,
            options,
            manager,
            poller,
            slots,
            teardown,
            span,
        })
    }

    /// Bound URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Endpoint options.
    pub fn options(&self) -> &Arc<EndpointOptions> {
        &self.options
    }

    /// Live clients according to the manager.
    pub fn client_count(&self) -> usize {
        self.manager.count()
    }

    /// Admission slots held by live clients and attempts still in progress.
    pub fn reserved_count(&self) -> usize {
        self.slots.taken()
    }

    /// Clients currently watched by the poller.
    pub fn polled_count(&self) -> usize {
        self.poller.count()
    }

    /// Whether `client` is watched by this endpoint's poller.
    pub fn is_polling(&self, client: &Client) -> bool {
        self.poller.contains(client)
    }

    /// Router with a single GET route for this endpoint's URI.
    pub fn router(self: &Arc<Self>) -> Router {
        let endpoint = Arc::clone(self);
        Router::new().route(
            &self.uri,
            get(
                move |headers: HeaderMap,
                      upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>| async move {
                    endpoint.establish(&headers, upgrade)
                },
            ),
        )
    }

    /// Handle one upgrade attempt.
    ///
    /// Requests without a `Connection: upgrade` token get a plain 200 naming the
    /// header. Every other attempt must reserve a slot first; when all
    /// `max_clients` slots are held the attempt is refused with 429 before any
    /// handshake.
    pub fn establish(
        self: &Arc<Self>,
        headers: &HeaderMap,
        upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ) -> Response {
        let connection = headers
            .get(CONNECTION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let wants_upgrade = connection
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
        if !wants_upgrade {
            return (StatusCode::OK, format!("Unsupported header: {connection}")).into_response();
        }

        let Some(permit) = self.slots.try_acquire() else {
            counter!(WS_CONNECTIONS_REJECTED_TOTAL, "uri" => self.uri.clone()).increment(1);
            warn!(parent: &self.span, max_clients = self.options.max_clients, "too many connections");
            return (StatusCode::TOO_MANY_REQUESTS, "Too Many Connections").into_response();
        };

        let upgrade = match upgrade {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                debug!(parent: &self.span, error = %rejection, "upgrade rejected");
                return rejection.into_response();
            }
        };

        // The permit rides in the callback; a failed handshake drops it unused.
        let endpoint = Arc::clone(self);
        let span = self.span.clone();
        upgrade
            .max_message_size(self.options.max_message_size)
            .on_upgrade(move |socket| {
                async move {
                    let client = Arc::new(Client::from_socket(Arc::clone(&endpoint.options), socket));
                    if let Err(err) = endpoint.register(client, permit).await {
                        warn!(error = %err, "failed to attach client");
                    }
                }
                .instrument(span)
            })
    }

    /// Attach an upgraded axum socket.
    pub async fn attach_socket(&self, socket: WebSocket) -> Result<Arc<Client>, EndpointError> {
        let permit = self.reserve()?;
        let client = Arc::new(Client::from_socket(Arc::clone(&self.options), socket));
        self.register(client, permit).await
    }

    /// Attach an already-upgraded connection given as its two halves.
    pub async fn attach(&self, stream: FrameStream, sink: FrameSink) -> Result<Arc<Client>, EndpointError> {
        let permit = self.reserve()?;
        let client = Arc::new(Client::new(Arc::clone(&self.options), stream, sink));
        self.register(client, permit).await
    }

    fn reserve(&self) -> Result<SlotPermit, EndpointError> {
        self.slots
            .try_acquire()
            .ok_or(EndpointError::Full(self.options.max_clients))
    }

    /// Register with the manager, announce the client, then start polling it.
    ///
    /// `on_connected` fires before the first read so that it always precedes
    /// `on_disconnected`.
    async fn register(&self, client: Arc<Client>, permit: SlotPermit) -> Result<Arc<Client>, EndpointError> {
        if let Err(err) = self.manager.register(Arc::clone(&client)).await {
            client.close().await;
            return Err(err.into());
        }

        gauge!(WS_CONNECTIONS_ACTIVE, "uri" => self.uri.clone()).increment(1.0);
        counter!(WS_CONNECTIONS_TOTAL, "uri" => self.uri.clone()).increment(1);
        info!(parent: &self.span, client_id = %client.id(), "client connected");
        (self.options.on_connected)(&client);

        if let Err(err) = self.poller.add(Arc::clone(&client)) {
            if let Err(unregister_err) = self.manager.unregister(&client).await {
                debug!(parent: &self.span, error = %unregister_err, "rollback unregister failed");
            }
            client.close().await;
            gauge!(WS_CONNECTIONS_ACTIVE, "uri" => self.uri.clone()).decrement(1.0);
            (self.options.on_disconnected)(&client);
            return Err(err.into());
        }
        permit.commit();
        Ok(client)
    }

    /// Tear `client` down. Returns `false` if it was already torn down.
    pub async fn disconnect(&self, client: &Arc<Client>) -> bool {
        self.teardown.disconnect(client).await
    }

    /// Stop polling, close every client and stop the adapter.
    ///
    /// `on_disconnected` does not fire for clients closed this way.
    pub async fn shutdown(&self) {
        let polled = self.poller.count();
        self.poller.shutdown().await;
        if let Err(err) = self.manager.close().await {
            debug!(parent: &self.span, error = %err, "client manager already closed");
        }
        self.options.adapter.shutdown().await;
        self.slots.release(polled);
        #[allow(clippy::cast_precision_loss)]
        let released = polled as f64;
        gauge!(WS_CONNECTIONS_ACTIVE, "uri" => self.uri.clone()).decrement(released);
        info!(parent: &self.span, clients = polled, "endpoint shut down");
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("uri", &self.uri)
            .field("clients", &self.client_count())
            .finish_non_exhaustive()
    }
}

/// Counter of admission slots, bounded by `max_clients`.
struct Slots {
    taken: AtomicUsize,
    max: usize,
}

impl Slots {
    fn new(max: usize) -> Self {
        Self {
            taken: AtomicUsize::new(0),
            max,
        }
    }

    fn try_acquire(self: &Arc<Self>) -> Option<SlotPermit> {
        self.taken
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < self.max).then_some(taken + 1)
            })
            .ok()
            .map(|_| SlotPermit {
                slots: Some(Arc::clone(self)),
            })
    }

    fn release(&self, count: usize) {
        let _ = self
            .taken
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                Some(taken.saturating_sub(count))
            });
    }

    fn taken(&self) -> usize {
        self.taken.load(Ordering::Acquire)
    }
}

/// One reserved slot. Returned on drop unless committed to a registered client.
struct SlotPermit {
    slots: Option<Arc<Slots>>,
}

impl SlotPermit {
    /// Hand the slot to the client; teardown returns it from here on.
    fn commit(mut self) {
        self.slots = None;
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.take() {
            slots.release(1);
        }
    }
}

#[derive(Clone)]
struct Teardown {
    uri: String,
    manager: ClientManager,
    poller: Weak<PollerPool>,
    slots: Arc<Slots>,
    options: Arc<EndpointOptions>,
}

impl Teardown {
    fn ready_callback(&self) -> ReadyCallback {
        let teardown = self.clone();
        Arc::new(move |clients: Vec<Arc<Client>>| {
            let teardown = teardown.clone();
            async move {
                for client in clients {
                    match client.resume().await {
                        Ok(()) => {}
                        Err(ClientError::ConnectionClosed | ClientError::Closed) => {
                            let _ = teardown.disconnect(&client).await;
                        }
                        Err(err) => {
                            debug!(client_id = %client.id(), error = %err, "dropping client");
                            let _ = teardown.disconnect(&client).await;
                        }
                    }
                }
            }
            .boxed()
        })
    }

    async fn disconnect(&self, client: &Arc<Client>) -> bool {
        client.close().await;
        let was_polled = self
            .poller
            .upgrade()
            .is_some_and(|poller| poller.remove(client));
        if let Err(err) = self.manager.unregister(client).await {
            debug!(client_id = %client.id(), error = %err, "unregister after close failed");
        }
        if was_polled {
            self.slots.release(1);
            gauge!(WS_CONNECTIONS_ACTIVE, "uri" => self.uri.clone()).decrement(1.0);
            counter!(WS_DISCONNECTIONS_TOTAL, "uri" => self.uri.clone()).increment(1);
            info!(client_id = %client.id(), "client disconnected");
            (self.options.on_disconnected)(client);
        }
        was_polled
    }
}
