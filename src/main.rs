//! Request shield.
//!
//! ```text
//!                         ┌──────────────────────────────────────────┐
//!     Client Request      │               REQUEST SHIELD             │
//!     ────────────────────┼─▶ http (source, body limit)              │
//!                         │        │                                 │
//!                         │        ▼                                 │
//!                         │   security::gate                         │
//!                         │     block check → rate check → classify  │
//!                         │        │                  │              │
//!     403 / 429           │        │ denied           │ admitted     │
//!     ◀───────────────────┼────────┘                  ▼              │
//!                         │                      upstream ───────────┼──▶ Protected
//!                         │                                          │    Service
//!                         │   admin API ◀── event log / registries   │
//!                         │   sweeper, config watcher, metrics       │
//!                         └──────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use request_shield::admin::serve_admin;
use request_shield::config::{load_config, watcher::ConfigWatcher, ShieldConfig};
use request_shield::lifecycle::{wait_for_termination, Shutdown};
use request_shield::observability::{logging, metrics};
use request_shield::security::{SecurityMiddleware, Sweeper};
use request_shield::ShieldServer;

#[derive(Parser)]
#[command(name = "request-shield")]
#[command(about = "Adaptive request defense in front of an HTTP service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // A bad config is fatal: no gate, no listener, no traffic.
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ShieldConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("request-shield v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shield = Arc::new(SecurityMiddleware::new(&config)?);
    let shutdown = Shutdown::new();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = config.upstream.address.as_deref().unwrap_or("<built-in>"),
        sustained_limit = config.rate_limit.sustained_limit,
        burst_limit = config.rate_limit.burst_limit,
        "Configuration loaded"
    );

    // Hot reload. The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::error!(error = %e, "Config watcher failed to start; hot reload disabled");
                    (None, updates)
                }
            }
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    tokio::spawn(Sweeper::new(shield.clone()).run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = ShieldServer::new(config.clone(), shield);

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin_state = server.state();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(admin_listener, admin_state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_termination().await;
        signal_shutdown.trigger();
    });

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
