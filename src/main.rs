//! Local development reverse proxy
//!
//! Fronts a cloud-hosted web application so a developer can serve the
//! front-end and one backend service locally while everything else is
//! forwarded to the cloud environment.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 DEV PROXY                     │
//!   Browser          │  ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//!   ─────────────────┼─▶│  server  │──▶│ classifier │──▶│dispatch │  │
//!                    │  └──────────┘   └────────────┘   └────┬────┘  │
//!                    │                                       │       │     local front-end
//!                    │           ┌──────────────┐            ├───────┼───▶ local backend
//!                    │           │ firm GUID    │◀───────────┤       │     cloud origin
//!                    │           │ resolver     │            │       │
//!                    │           └──────────────┘   ┌────────▼────┐  │
//!   ◀────────────────┼──────────────────────────────│  upstream   │  │
//!                    │                              │  + relay    │  │
//!                    │                              └─────────────┘  │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use dev_proxy::config::{load_config, ConfigOverrides, ObservabilityConfig};
use dev_proxy::error::ProxyError;
use dev_proxy::lifecycle::signals::spawn_signal_listener;
use dev_proxy::observability::{logging, metrics};
use dev_proxy::{ProxyServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "dev-proxy", version, about = "Local development reverse proxy")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "DEV_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Cloud origin that passthrough traffic is sent to
    #[arg(long, env = "TARGET_ORIGIN")]
    target_origin: Option<String>,

    /// Port of the local front-end dev server
    #[arg(long, env = "LOCAL_APP_PORT")]
    frontend_port: Option<u16>,

    /// Port of the local backend service
    #[arg(long, env = "LOCAL_API_PORT")]
    backend_port: Option<u16>,

    /// Send service-API calls to the cloud instead of the local backend
    #[arg(long)]
    cloud_mode: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            cloud_origin: self.target_origin.clone(),
            frontend_port: self.frontend_port,
            backend_port: self.backend_port,
            cloud_mode: self.cloud_mode,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), &cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!("dev-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: dev_proxy::ProxyConfig) -> Result<(), ProxyError> {
    let bind_address = config.listener.bind_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|e| ProxyError::bind(bind_address.clone(), e))?;

    tracing::info!(
        port = config.listener.port,
        cloud_origin = %config.upstreams.cloud_origin,
        frontend_port = config.upstreams.frontend_port,
        backend_port = config.upstreams.backend_port,
        "Configuration loaded"
    );

    let server = ProxyServer::new(config)?;

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await
}
