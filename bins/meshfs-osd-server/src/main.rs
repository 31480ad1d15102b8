use std::sync::Arc;

use clap::Parser;
use meshfs_config::ServiceConfig;
use meshfs_heartbeat::{HeartbeatAgent, HeartbeatOptions, ServiceDataSource};
use meshfs_logging::LogConfig;
use meshfs_proto::{Service, ServiceSet, ServiceType};
use meshfs_stubs::InMemoryDirService;
use meshfs_types::ServiceUuid;

/// MeshFS Object Storage Device Server
#[derive(Parser, Debug)]
#[command(name = "meshfs-osd-server", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "osd-server.toml")]
    config: String,

    /// Dump the default configuration and exit
    #[arg(long)]
    dump_default_config: bool,
}

/// Wait for a shutdown signal (CTRL+C or SIGTERM).
async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received CTRL+C"); }
        _ = sigterm.recv() => { tracing::info!("Received SIGTERM"); }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.dump_default_config {
        println!("{}", toml::to_string_pretty(&ServiceConfig::default())?);
        return Ok(());
    }

    let _log_guard = meshfs_logging::init_logging(&LogConfig::default());

    let config = ServiceConfig::from_file(&args.config)?;
    let uuid = ServiceUuid::new(config.uuid.clone());
    tracing::info!(config = %args.config, uuid = %uuid, "Starting MeshFS OSD server");

    // TODO: replace with the RPC-backed DIR client once the OSD's network
    // transport is wired up; until then an in-memory DIR stands in.
    let dir = InMemoryDirService::new().into_arc();

    let record_uuid = config.uuid.clone();
    let record_name = config.uuid.clone();
    let data_source: Arc<dyn ServiceDataSource> = Arc::new(move || {
        ServiceSet::of(vec![Service::new(
            record_uuid.clone(),
            ServiceType::Osd,
            record_name.clone(),
        )
        .with_data("free", "1073741824")])
    });

    let agent = HeartbeatAgent::new(dir, uuid, data_source, config, HeartbeatOptions::default());
    agent.initialize().await?;
    agent.start();
    tracing::info!("OSD server running — press Ctrl+C to stop");

    wait_for_shutdown_signal().await;
    tracing::info!("OSD server shutting down");
    agent.shutdown().await;
    agent.join().await;

    Ok(())
}
