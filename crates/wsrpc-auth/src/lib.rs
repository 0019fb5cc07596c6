//! # wsrpc-auth
//!
//! Token authentication for wsrpc connections.
//!
//! - [`Authenticator`]: validates a token into claims and issues tokens
//! - [`JwtAuthenticator`]: HMAC-signed JWTs checked locally
//! - [`HttpAuthenticator`]: delegates the check to an HTTP service
//! - [`AuthRpc`]: registers `Auth.Authenticate` on an RPC adapter and stores
//!   the resulting claims in the caller's metadata

#![deny(unsafe_code)]

pub mod authenticator;
pub mod errors;
pub mod http;
pub mod jwt;
pub mod rpc;

pub use authenticator::{Authenticator, Claims};
pub use errors::AuthError;
pub use http::HttpAuthenticator;
pub use jwt::JwtAuthenticator;
pub use rpc::AuthRpc;
