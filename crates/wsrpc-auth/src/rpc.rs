//! `Auth.Authenticate` RPC method.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};
use wsrpc_server::{Context, MethodHandler, RpcAdapter, RpcError};

use crate::authenticator::{Authenticator, Claims};

/// Auth RPC module.
pub struct AuthRpc {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthRpc {
    /// Method name for token authentication.
    pub const AUTHENTICATE: &'static str = "Auth.Authenticate";

    /// Module backed by `authenticator`.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Register the module's methods on `adapter`.
    pub fn register(&self, adapter: &RpcAdapter) {
        adapter.register(
            Self::AUTHENTICATE,
            Arc::new(AuthenticateHandler::new(Arc::clone(&self.authenticator))),
        );
    }
}

/// Reply of `Auth.Authenticate`.
#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    /// Whether the token was accepted.
    pub success: bool,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Claims of an accepted token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Claims>,
}

/// Validates `params[0]` as a token and stores its claims on the client.
///
/// A token that fails validation is a normal reply with `success: false`.
pub struct AuthenticateHandler {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenticateHandler {
    /// Handler backed by `authenticator`.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl MethodHandler for AuthenticateHandler {
    #[instrument(skip_all, fields(client_id = %ctx.client().id()))]
    async fn handle(&self, ctx: &Context) -> Result<Value, RpcError> {
        let token = match ctx.param(0) {
            Some(Value::String(token)) if !token.is_empty() => token.as_str(),
            Some(Value::String(_)) => return Err(RpcError::invalid_params("token must not be empty")),
            _ => return Err(RpcError::invalid_params("token must be a string")),
        };

        let response = match self.authenticator.authenticate(token).await {
            Ok(claims) => {
                for (key, value) in &claims {
                    ctx.meta().set(key.clone(), value.clone());
                }
                info!(claims = claims.len(), "client authenticated");
                AuthenticateResponse {
                    success: true,
                    message: None,
                    data: Some(claims),
                }
            }
            Err(err) => {
                info!(error = %err, "authentication failed");
                AuthenticateResponse {
                    success: false,
                    message: Some(err.to_string()),
                    data: None,
                }
            }
        };
        serde_json::to_value(response).map_err(RpcError::internal)
    }
}
