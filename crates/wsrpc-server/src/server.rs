//! Registry of endpoints keyed by URI.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use parking_lot::RwLock;
use tracing::info;

use crate::errors::ServerError;
use crate::websocket::{Endpoint, EndpointOptions};

/// Owns every endpoint of a process and builds the router serving them.
#[derive(Default)]
pub struct WebSocketServer {
    endpoints: RwLock<HashMap<String, Arc<Endpoint>>>,
}

impl WebSocketServer {
    /// Empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new endpoint to `uri`.
    pub fn create_endpoint(
        &self,
        uri: &str,
        options: EndpointOptions,
    ) -> Result<Arc<Endpoint>, ServerError> {
        if !uri.starts_with('/') {
            return Err(ServerError::InvalidUri(uri.to_string()));
        }
        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(uri) {
            return Err(ServerError::DuplicateEndpoint(uri.to_string()));
        }
        let endpoint = Endpoint::new(uri, options);
        let _ = endpoints.insert(uri.to_string(), Arc::clone(&endpoint));
        info!(uri, "endpoint created");
        Ok(endpoint)
    }

    /// Endpoint bound to `uri`.
    pub fn endpoint(&self, uri: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.read().get(uri).cloned()
    }

    /// Unbind `uri`. The caller owns shutting the endpoint down.
    pub fn remove_endpoint(&self, uri: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.write().remove(uri)
    }

    /// Bound URIs, sorted.
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.endpoints.read().keys().cloned().collect();
        uris.sort();
        uris
    }

    /// Router serving every endpoint bound at the time of the call.
    pub fn router(&self) -> Router {
        self.endpoints
            .read()
            .values()
            .fold(Router::new(), |router, endpoint| router.merge(endpoint.router()))
    }

    /// Shut down every bound endpoint.
    pub async fn shutdown(&self) {
        let endpoints: Vec<Arc<Endpoint>> = self.endpoints.read().values().cloned().collect();
        for endpoint in endpoints {
            endpoint.shutdown().await;
        }
    }
}
