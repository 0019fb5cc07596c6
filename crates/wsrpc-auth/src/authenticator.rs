//! Authenticator seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AuthError;

/// Claims extracted from a valid token.
pub type Claims = HashMap<String, Value>;

/// Validates tokens and issues new ones.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify `token` and return its claims.
    async fn authenticate(&self, token: &str) -> Result<Claims, AuthError>;

    /// Issue a token carrying `claims`.
    async fn generate_token(&self, claims: &Claims) -> Result<String, AuthError>;
}
