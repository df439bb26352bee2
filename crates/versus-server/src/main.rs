//! Versus session server: entry point.
//!
//! Seats two game clients, starts their game, relays their moves, and
//! announces the result.
//!
//! # Usage
//!
//! ```text
//! versus-server [OPTIONS]
//!
//! Options:
//!   --config <FILE>  TOML config file
//!   --bind   <IP>    Address to listen on        [default: 0.0.0.0]
//!   --port   <PORT>  Port to listen on           [default: 8080]
//!   --path   <PATH>  WebSocket upgrade path      [default: /ws]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence over environment variables, which take
//! precedence over the config file.
//!
//! | Variable        | Description               |
//! |-----------------|---------------------------|
//! | `VERSUS_CONFIG` | Path to a TOML config file |
//! | `VERSUS_BIND`   | Listen address             |
//! | `VERSUS_PORT`   | Listen port                |
//! | `VERSUS_PATH`   | WebSocket upgrade path     |

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use versus_server::domain::ServerConfig;
use versus_server::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Versus two-player session server.
#[derive(Debug, Parser)]
#[command(
    name = "versus-server",
    about = "Two-player session coordinator for Versus game clients",
    version
)]
struct Cli {
    /// TOML config file.  Values given on the command line win over it.
    #[arg(long, env = "VERSUS_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "VERSUS_BIND")]
    bind: Option<IpAddr>,

    /// TCP port to listen on.
    #[arg(long, env = "VERSUS_PORT")]
    port: Option<u16>,

    /// HTTP path that accepts the WebSocket upgrade.
    #[arg(long, env = "VERSUS_PATH")]
    path: Option<String>,
}

impl Cli {
    /// Builds the effective [`ServerConfig`]: file (or defaults), then
    /// command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged result is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(ip) = self.bind {
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.path {
            config.path = path;
        }

        config.validate().context("invalid server configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "Versus session server starting on {} (path {})",
        config.bind_addr, config.path
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("Versus session server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
