//! Live traffic-splitting gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ shared listener(s) ──▶ http server ──▶ Dispatcher
//!                                                              │ path prefix / host
//!                                                              ▼
//!                                                        ProxyInstance
//!                                               attribution → selection
//!                                                              │
//!                               ┌──────────────────────────────┼───────────────┐
//!                               ▼                              ▼               ▼
//!                        reverse forward               301 redirect    internal re-dispatch
//!                                                                         (one hop)
//!
//!     Supervisor ── owns registry + dispatch tables
//!         ├── Store (configs)          ├── stats flush loop → event stream
//!         └── ConfigSyncChannel (fleet notifications)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use split_gateway::config::loader::load_config;
use split_gateway::config::validation::validate_config;
use split_gateway::lifecycle::{bind_listeners, wait_for_signal, Shutdown};
use split_gateway::observability::{logging, metrics};
use split_gateway::proxy::Upstream;
use split_gateway::stats::LogSink;
use split_gateway::store::MemoryStore;
use split_gateway::sync::LocalBus;
use split_gateway::{GatewayConfig, HttpServer, Supervisor, SupervisorSettings};

#[derive(Parser)]
#[command(name = "split-gateway")]
#[command(about = "Weighted, rule-based and sticky traffic splitting gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(|errors| {
                errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
            })?;
            config
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("split-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.check {
        tracing::info!(units = config.units.len(), "Configuration is valid");
        return Ok(());
    }

    tracing::info!(
        bind_addresses = ?config.listener.bind_addresses,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        request_timeout_secs = config.timeouts.request_secs,
        flush_interval_secs = config.stats.flush_interval_secs,
        sync_enabled = config.sync.enabled,
        "Configuration loaded"
    );

    // Binding is the only fatal startup step.
    let listeners = bind_listeners(&config.listener).await?;

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let store = MemoryStore::seeded(config.units.clone());
    let mut supervisor = Supervisor::new(
        Arc::new(store),
        Arc::new(LogSink),
        Upstream::new(config.timeouts.upstream()),
        SupervisorSettings::from(&config.stats),
    );
    if config.sync.enabled {
        supervisor = supervisor.with_sync(Arc::new(LocalBus::default()));
    }
    let supervisor = Arc::new(supervisor);

    let shutdown = Shutdown::new();
    let tasks = supervisor.start(&shutdown).await;

    let server = HttpServer::new(supervisor.dispatcher(), &config.timeouts);
    let serving = tokio::spawn(server.run(listeners, shutdown.clone()));

    wait_for_signal().await;
    tracing::info!("Shutting down, draining in-flight requests");
    shutdown.trigger();

    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
    }
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
