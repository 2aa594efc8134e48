//! BGP peer discovery daemon entry point.
//!
//! Loads the device inventory, then repeatedly runs discovery for every
//! device until shut down. Per-device failures are logged and do not
//! stop the loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bgpsyncd::{BgpSync, Config, Device, RedisPeerStore, SnmpCliTransport, StaticAsResolver};

/// BGP peer discovery and synchronization daemon
#[derive(Parser, Debug)]
#[command(name = "bgpsyncd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/bgpsyncd/config.yaml")]
    config: PathBuf,

    /// Redis server host (overrides the config file)
    #[arg(long)]
    redis_host: Option<String>,

    /// Redis server port (overrides the config file)
    #[arg(long)]
    redis_port: Option<u16>,

    /// Run a single discovery pass and exit
    #[arg(long)]
    oneshot: bool,

    /// Log filter (e.g. info, bgpsyncd=debug)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).context("invalid log filter")?,
        )
        .with_target(true)
        .compact()
        .init();

    info!("bgpsyncd: starting BGP peer discovery daemon");

    let mut config = Config::load(&args.config)?;
    if let Some(host) = args.redis_host {
        config.redis.host = host;
    }
    if let Some(port) = args.redis_port {
        config.redis.port = port;
    }

    let store = RedisPeerStore::new(&config.redis.host, config.redis.port)
        .await
        .context("failed to connect to Redis")?;
    let transport = SnmpCliTransport::new(
        Duration::from_secs(config.snmp.timeout_secs),
        config.snmp.retries,
    );
    let resolver = StaticAsResolver::new(config.as_names.clone());
    let sync = BgpSync::new(transport, store, resolver);

    let mut devices: Vec<Device> = config
        .devices
        .iter()
        .map(|d| d.build(&config.snmp))
        .collect();
    info!(devices = devices.len(), "Loaded device inventory");

    let interval = Duration::from_secs(config.poll_interval_secs);
    loop {
        run_pass(&sync, &mut devices).await;

        if args.oneshot {
            info!("Oneshot pass complete, exiting");
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting");
                return Ok(());
            }
        }
    }
}

/// One discovery pass over every device in the inventory.
async fn run_pass<T, S, R>(sync: &BgpSync<T, S, R>, devices: &mut [Device])
where
    T: bgpsyncd::SnmpTransport,
    S: bgpsyncd::PeerStore,
    R: bgpsyncd::AsTextResolver,
{
    for device in devices.iter_mut() {
        match sync.discover_device(device).await {
            Ok(summaries) => {
                for summary in summaries {
                    info!(
                        device_id = summary.device_id,
                        context = summary.context.as_deref().unwrap_or("default"),
                        peers_added = summary.peers_added,
                        peers_updated = summary.peers_updated,
                        peers_removed = summary.peers_removed,
                        families_added = summary.families_added,
                        families_removed = summary.families_removed,
                        "Discovery summary"
                    );
                }
            }
            Err(e) => {
                error!(device = %device.hostname, error = %e, "Device discovery failed");
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
