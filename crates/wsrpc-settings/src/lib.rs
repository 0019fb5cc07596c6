//! # wsrpc-settings
//!
//! Configuration for the wsrpc server.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If a settings file exists, deep-merge its values over the defaults
//! 3. Apply `WSRPC_*` environment variable overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path};
pub use types::{
    AuthMode, AuthSettings, EndpointSettings, LogFormat, LoggingSettings, QueueSettings,
    ServerSettings, Settings,
};
