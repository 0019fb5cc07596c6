//! Auth error types.

/// Errors from authenticators.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token was empty.
    #[error("empty token")]
    EmptyToken,

    /// The token failed verification.
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The auth service could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth service refused the token.
    #[error("token rejected ({status})")]
    Rejected {
        /// HTTP status returned by the service.
        status: u16,
    },

    /// A claim needed to issue a token is missing or not a string.
    #[error("missing claim: {0}")]
    MissingClaim(String),

    /// The authenticator cannot perform this operation.
    #[error("{0} is not supported by this authenticator")]
    Unsupported(&'static str),
}
