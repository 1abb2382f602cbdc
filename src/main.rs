//! badgateway-proxy
//!
//! Forwards every request to a single backend application. When the backend
//! can't be reached the client gets `502 Bad Gateway` instead of a generic
//! 500, with a self-reloading diagnostic page in development mode.
//!
//! ```text
//!  Client ──▶ request id ──▶ trace ──▶ BadGateway ──▶ timeout ──▶ Upstream ──▶ Backend
//!         ◀── response ◀──────────────── 502 on failure ◀──────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use badgateway_proxy::config::{self, ProxyConfig};
use badgateway_proxy::gateway;
use badgateway_proxy::lifecycle::{self, signals, Shutdown};
use badgateway_proxy::observability::init_logging;

#[derive(Parser, Debug)]
#[command(name = "badgateway-proxy", version, about = "Reverse proxy that turns backend failures into 502 responses")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve the diagnostic HTML page on backend failures.
    #[arg(long)]
    development_mode: bool,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `backend.address`.
    #[arg(long)]
    backend: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ProxyConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => ProxyConfig::default(),
        };

        if self.development_mode {
            config.development_mode = true;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(backend) = &self.backend {
            config.backend.address = backend.clone();
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    // Must run before the runtime spawns its worker threads.
    gateway::local_offset();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&config.observability);
    tracing::info!("badgateway-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.address,
        development_mode = config.development_mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let (server, listener) = lifecycle::start(config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
