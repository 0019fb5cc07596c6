//! HMAC-signed JWT authenticator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::authenticator::{Authenticator, Claims};
use crate::errors::AuthError;

/// Claim exposed to callers for the user id.
const ID_CLAIM: &str = "id";

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

/// Verifies and issues HMAC-SHA JWTs with a shared secret.
///
/// Issued tokens are HS512. Tokens without `exp` never expire.
pub struct JwtAuthenticator {
    secret: RwLock<Vec<u8>>,
    ttl: Option<Duration>,
}

impl JwtAuthenticator {
    /// Authenticator using `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: RwLock::new(secret.into()),
            ttl: None,
        }
    }

    /// Stamp issued tokens with an expiry `ttl` from now.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Replace the secret. Tokens signed with the old one stop validating.
    pub fn set_secret(&self, secret: impl Into<Vec<u8>>) {
        *self.secret.write() = secret.into();
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims.clear();
        validation
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        let secret = self.secret.read().clone();
        let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&secret), &Self::validation())
            .inspect_err(|err| debug!(error = %err, "jwt rejected"))?;
        Ok(HashMap::from([(
            ID_CLAIM.to_string(),
            Value::String(data.claims.user_id),
        )]))
    }

    async fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        let user_id = claims
            .get(ID_CLAIM)
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::MissingClaim(ID_CLAIM.to_string()))?;
        let exp = self
            .ttl
            .map(|ttl| jsonwebtoken::get_current_timestamp() + ttl.as_secs());
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            exp,
        };
        let secret = self.secret.read().clone();
        Ok(encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(&secret),
        )?)
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
