//! # wsrpc
//!
//! Server binary: loads settings, initializes logging and metrics, serves the
//! JSON-RPC endpoint until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use wsrpc::{App, ShutdownCoordinator, logging};
use wsrpc_settings::Settings;

/// JSON-RPC over WebSocket server.
#[derive(Parser, Debug)]
#[command(name = "wsrpc", about = "JSON-RPC over WebSocket server")]
struct Cli {
    /// Settings file (defaults to `$WSRPC_CONFIG`, then `./wsrpc.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Default log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Do not install the Prometheus recorder or serve `/metrics`.
    #[arg(long)]
    no_metrics: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Settings come first: they carry the log level.
    let mut settings = match &cli.config {
        Some(path) => wsrpc_settings::load_settings_from_path(path),
        None => wsrpc_settings::load_settings(),
    }
    .context("failed to load settings")?;
    cli.apply(&mut settings);

    logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let mut app = App::build(settings)?;
    if !cli.no_metrics {
        match wsrpc::metrics::install_recorder() {
            Ok(handle) => app = app.with_metrics(handle),
            Err(error) => tracing::warn!(%error, "metrics disabled"),
        }
    }

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let coordinator = ShutdownCoordinator::new();
    let signal = coordinator.listen_for_ctrl_c();

    let served = app.serve(listener, coordinator.token()).await;
    coordinator.graceful_shutdown(vec![signal], None).await;
    served?;

    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["wsrpc"]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, "info");
        assert!(!cli.no_metrics);
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "wsrpc",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--log-level",
            "debug",
            "--config",
            "/tmp/wsrpc.json",
        ]);
        let mut settings = Settings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wsrpc.json")));
    }

    #[test]
    fn cli_rejects_out_of_range_port() {
        assert!(Cli::try_parse_from(["wsrpc", "--port", "70000"]).is_err());
    }
}
