//! Settings schema.

use serde::{Deserialize, Serialize};

/// Root settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Listener.
    pub server: ServerSettings,
    /// The RPC endpoint.
    pub endpoint: EndpointSettings,
    /// Worker pool.
    pub queue: QueueSettings,
    /// Token authentication.
    pub auth: AuthSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. 0 picks a free port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// RPC endpoint binding and admission.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// URI path of the WebSocket endpoint.
    pub uri: String,
    /// Live clients allowed before upgrades are refused.
    pub max_clients: usize,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            uri: "/ws".to_string(),
            max_clients: 4096,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// Request queue and workers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueSettings {
    /// Number of workers.
    pub workers: usize,
    /// Queue capacity.
    pub capacity: usize,
    /// Per-handler time limit in milliseconds. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_timeout_ms: Option<u64>,
    /// How long shutdown waits for in-flight handlers before aborting them.
    pub drain_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 32,
            capacity: 1024,
            handler_timeout_ms: None,
            drain_timeout_ms: 10_000,
        }
    }
}

/// Which authenticator backs `Auth.Authenticate`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Local JWT verification.
    #[default]
    Jwt,
    /// Delegated HTTP check.
    Http,
}

/// Token authentication.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Authenticator kind.
    pub mode: AuthMode,
    /// JWT signing secret.
    pub secret: String,
    /// URL of the delegated auth service.
    pub auth_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            mode: AuthMode::Jwt,
            secret: String::new(),
            auth_url: "http://0.0.0.0/auth".to_string(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single line.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
