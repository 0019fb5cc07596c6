//! Application assembly: settings in, router and serve loop out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wsrpc_auth::{AuthRpc, Authenticator, HttpAuthenticator, JwtAuthenticator};
use wsrpc_jsonrpc::JsonRpc;
use wsrpc_server::{Adapter, Client, Endpoint, EndpointOptions, RpcAdapter, WebSocketServer};
use wsrpc_settings::{AuthMode, AuthSettings, Settings};

use crate::health::{self, HealthResponse};
use crate::system::SystemRpc;

/// A configured server: one JSON-RPC endpoint plus `/health`.
pub struct App {
    settings: Settings,
    server: Arc<WebSocketServer>,
    endpoint: Arc<Endpoint>,
    adapter: Arc<RpcAdapter>,
    authenticator: Arc<dyn Authenticator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

#[derive(Clone)]
struct HealthState {
    endpoint: Arc<Endpoint>,
    start_time: Instant,
}

impl App {
    /// Build the adapter, endpoint and RPC modules described by `settings`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(settings: Settings) -> anyhow::Result<Self> {
        let adapter = Arc::new(
            RpcAdapter::builder()
                .backend(JsonRpc)
                .workers(settings.queue.workers)
                .queue_capacity(settings.queue.capacity)
                .handler_timeout(settings.queue.handler_timeout_ms.map(Duration::from_millis))
                .drain_timeout(Duration::from_millis(settings.queue.drain_timeout_ms))
                .build(),
        );

        let authenticator = build_authenticator(&settings.auth);
        SystemRpc.register(&adapter);
        AuthRpc::new(Arc::clone(&authenticator)).register(&adapter);

        let options = EndpointOptions::default()
            .adapter(Arc::clone(&adapter) as Arc<dyn Adapter>)
            .max_clients(settings.endpoint.max_clients)
            .max_message_size(settings.endpoint.max_message_size)
            .on_connected(|client: &Arc<Client>| debug!(client_id = %client.id(), "session opened"))
            .on_disconnected(|client: &Arc<Client>| {
                debug!(
                    client_id = %client.id(),
                    duration_secs = client.connected_at().elapsed().as_secs(),
                    "session closed"
                );
            });

        let server = Arc::new(WebSocketServer::new());
        let endpoint = server
            .create_endpoint(&settings.endpoint.uri, options)
            .context("failed to create RPC endpoint")?;

        info!(
            uri = endpoint.uri(),
            methods = ?adapter.methods(),
            workers = adapter.workers(),
            "app built"
        );

        Ok(Self {
            settings,
            server,
            endpoint,
            adapter,
            authenticator,
            metrics: None,
            start_time: Instant::now(),
        })
    }

    /// Serve Prometheus text from `handle` on `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Settings the app was built from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The RPC adapter, for registering further methods.
    pub fn adapter(&self) -> &Arc<RpcAdapter> {
        &self.adapter
    }

    /// The RPC endpoint.
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    /// Authenticator backing `Auth.Authenticate`.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Router with every endpoint route, `/health` and, if enabled, `/metrics`.
    pub fn router(&self) -> Router {
        let state = HealthState {
            endpoint: Arc::clone(&self.endpoint),
            start_time: self.start_time,
        };
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .with_state(state)
            .merge(self.server.router());

        if let Some(handle) = self.metrics.clone() {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        }
        router
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    ///
    /// Cancellation closes every WebSocket client before in-flight HTTP requests drain.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = listener.local_addr().context("listener has no local address")?;
        info!(%addr, uri = self.endpoint.uri(), "listening");

        let server = Arc::clone(&self.server);
        let signal = async move {
            shutdown.cancelled().await;
            info!("shutting down endpoints");
            server.shutdown().await;
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await
            .context("server error")?;

        info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("uri", &self.endpoint.uri())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

fn build_authenticator(auth: &AuthSettings) -> Arc<dyn Authenticator> {
    match auth.mode {
        AuthMode::Jwt => {
            if auth.secret.is_empty() {
                warn!("auth secret is empty, JWT tokens are signed with an empty key");
            }
            Arc::new(JwtAuthenticator::new(auth.secret.as_bytes().to_vec()))
        }
        AuthMode::Http => Arc::new(HttpAuthenticator::new(auth.auth_url.clone())),
    }
}

async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.endpoint.client_count(),
    ))
}
