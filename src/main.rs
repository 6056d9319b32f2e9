use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use uplink_core::bus::EventBus;
use uplink_core::model::MemoryModel;
use uplink_core::transport::SessionSlot;
use uplink_server::ServerConfig;
use uplink_sync::{ChannelSyncStrategy, SchedulerConfig, SyncService};

/// Backend-to-frontend state sync server.
#[derive(Parser)]
#[command(name = "uplink", version, about)]
struct Args {
    /// Port for the WebSocket server.
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Milliseconds before the first periodic delta sync.
    #[arg(long, default_value_t = 3000)]
    initial_delay_ms: u64,

    /// Seconds between periodic delta syncs.
    #[arg(long, default_value_t = 5)]
    sync_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Starting Uplink sync server");

    let model = Arc::new(MemoryModel::new());
    let bus = Arc::new(EventBus::default());
    let slot = Arc::new(SessionSlot::new());
    let strategy = Arc::new(ChannelSyncStrategy::new());

    let scheduler_config = SchedulerConfig {
        initial_delay: Duration::from_millis(args.initial_delay_ms),
        interval: Duration::from_secs(args.sync_interval_secs),
    };
    let service = Arc::new(SyncService::new(
        strategy,
        model,
        Arc::clone(&slot),
        scheduler_config,
    ));
    service.attach(&bus);
    service.start();

    let server_config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let server = uplink_server::start(server_config, Arc::clone(&service), slot)
        .await
        .expect("Failed to start server");

    tracing::info!(port = server.port, "Uplink server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    service.stop();
    tracing::info!("Shutting down");
}
