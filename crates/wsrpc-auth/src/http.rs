//! Authenticator that delegates token checks to an HTTP service.
//!
//! The service receives `GET <url>` with `Authorization: Bearer <token>` and
//! answers 200 for a valid token. Claims travel back as `X-Jwt-<Key>` response
//! headers.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use crate::authenticator::{Authenticator, Claims};
use crate::errors::AuthError;

/// Prefix of claim-carrying response headers (header names are lowercase).
const CLAIM_HEADER_PREFIX: &str = "x-jwt-";

/// Delegating authenticator.
pub struct HttpAuthenticator {
    url: RwLock<String>,
    client: reqwest::Client,
}

impl HttpAuthenticator {
    /// Authenticator calling `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    /// Authenticator calling `url` through `client`.
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: RwLock::new(url.into()),
            client,
        }
    }

    /// Point at a different service.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.url.write() = url.into();
    }

    /// Current service URL.
    pub fn url(&self) -> String {
        self.url.read().clone()
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        let url = self.url();
        let resp = self.client.get(&url).bearer_auth(token).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            debug!(%url, status, "auth service rejected token");
            return Err(AuthError::Rejected { status });
        }
        Ok(claims_from_headers(resp.headers()))
    }

    async fn generate_token(&self, _claims: &Claims) -> Result<String, AuthError> {
        Err(AuthError::Unsupported("generate_token"))
    }
}

/// Collect `X-Jwt-<Key>` headers as claims keyed by lowercase `<key>`.
///
/// One value becomes a string, repeated values an array of strings.
pub fn claims_from_headers(headers: &HeaderMap) -> Claims {
    let mut claims = Claims::new();
    for name in headers.keys() {
        let Some(key) = name.as_str().strip_prefix(CLAIM_HEADER_PREFIX) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let mut values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(|value| Value::String(value.to_string()))
            .collect();
        let claim = match values.len() {
            0 => continue,
            1 => values.swap_remove(0),
            _ => Value::Array(values),
        };
        let _ = claims.insert(key.to_lowercase(), claim);
    }
    claims
}
