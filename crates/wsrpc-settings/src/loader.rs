//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{AuthMode, Settings};

/// Settings file used when none is given: `$WSRPC_CONFIG`, else `./wsrpc.json`.
pub fn settings_path() -> PathBuf {
    std::env::var("WSRPC_CONFIG")
        .ok()
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from("wsrpc.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: Settings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `WSRPC_*` environment variable overrides.
///
/// Unparsable or out-of-range values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut Settings) {
    // ── Listener ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("WSRPC_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("WSRPC_PORT", 0, 65535) {
        settings.server.port = v;
    }

    // ── Endpoint ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("WSRPC_URI") {
        settings.endpoint.uri = v;
    }
    if let Some(v) = read_env_usize("WSRPC_MAX_CLIENTS", 1, 1_000_000) {
        settings.endpoint.max_clients = v;
    }
    if let Some(v) = read_env_usize("WSRPC_MAX_MESSAGE_SIZE", 1024, 1 << 30) {
        settings.endpoint.max_message_size = v;
    }

    // ── Queue ───────────────────────────────────────────────────────
    if let Some(v) = read_env_usize("WSRPC_WORKERS", 1, 4096) {
        settings.queue.workers = v;
    }
    if let Some(v) = read_env_usize("WSRPC_QUEUE_CAPACITY", 1, 1_000_000) {
        settings.queue.capacity = v;
    }
    if let Some(v) = read_env_u64("WSRPC_HANDLER_TIMEOUT_MS", 1, 3_600_000) {
        settings.queue.handler_timeout_ms = Some(v);
    }
    if let Some(v) = read_env_u64("WSRPC_DRAIN_TIMEOUT_MS", 1, 3_600_000) {
        settings.queue.drain_timeout_ms = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("WSRPC_AUTH_MODE") {
        match parse_auth_mode(&v) {
            Some(mode) => settings.auth.mode = mode,
            None => tracing::warn!(key = "WSRPC_AUTH_MODE", value = %v, "invalid auth mode, ignoring"),
        }
    }
    if let Some(v) = read_env_string("WSRPC_AUTH_SECRET") {
        settings.auth.secret = v;
    }
    if let Some(v) = read_env_string("WSRPC_AUTH_URL") {
        settings.auth.auth_url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("WSRPC_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse an auth mode name, case-insensitively.
pub fn parse_auth_mode(val: &str) -> Option<AuthMode> {
    match val.to_lowercase().as_str() {
        "jwt" => Some(AuthMode::Jwt),
        "http" => Some(AuthMode::Http),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::errors::SettingsError;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"queue": {"workers": 32, "capacity": 1024}});
        let source = serde_json::json!({"queue": {"workers": 8}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["queue"]["workers"], 8);
        assert_eq!(merged["queue"]["capacity"], 1024);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let merged = deep_merge(target, serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_arrays_replace() {
        let target = serde_json::json!({"a": [1, 2, 3]});
        let merged = deep_merge(target, serde_json::json!({"a": [9]}));
        assert_eq!(merged["a"], serde_json::json!([9]));
    }

    #[test]
    fn merge_adds_new_keys() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 0, 65535), Some(8080));
        assert_eq!(parse_u16_range("70000", 0, 65535), None);
        assert_eq!(parse_usize_range("0", 1, 10), None);
        assert_eq!(parse_usize_range("5", 1, 10), Some(5));
        assert_eq!(parse_u64_range("abc", 1, 10), None);
    }

    #[test]
    fn parse_auth_modes() {
        assert_eq!(parse_auth_mode("JWT"), Some(AuthMode::Jwt));
        assert_eq!(parse_auth_mode("http"), Some(AuthMode::Http));
        assert_eq!(parse_auth_mode("ldap"), None);
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.endpoint.uri, "/ws");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"endpoint": {{"uri": "/rpc", "maxClients": 10}}, "queue": {{"handlerTimeoutMs": 2500}}}}"#
        )
        .unwrap();

        let settings = load_settings_from_path(file.path()).unwrap();
        assert_eq!(settings.endpoint.uri, "/rpc");
        assert_eq!(settings.endpoint.max_clients, 10);
        assert_eq!(settings.endpoint.max_message_size, 16 * 1024 * 1024);
        assert_eq!(settings.queue.handler_timeout_ms, Some(2500));
        assert_eq!(settings.queue.workers, 32);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = load_settings_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }
}
