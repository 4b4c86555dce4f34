use bifrost::config::{ChaseMode, ServerConfig, WatchMode, parse_bind_addr, parse_forward_server};
use bifrost::error::{DnsError, Result};
use bifrost::resolver::ResolutionEngine;
use bifrost::server::DnsServer;
use bifrost::zone::{NotifyDetector, RecordStore, ZoneLoader, ZoneWatcher, load_initial};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Authoritative DNS server for a single zone file, with forwarding fallback.
#[derive(Debug, Parser)]
#[command(name = "bifrost", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Zone file to serve
    #[arg(short = 'z', long, value_name = "FILE")]
    zone_file: Option<PathBuf>,

    /// Origin for relative names in the zone file
    #[arg(long, value_name = "DOMAIN")]
    origin: Option<String>,

    /// Address to listen on (ip:port)
    #[arg(short, long, value_name = "ADDR", conflicts_with = "port")]
    bind: Option<String>,

    /// UDP/TCP port to listen on, all interfaces
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream server for names the zone does not answer
    #[arg(short, long, value_name = "ADDR")]
    forward_server: Option<String>,

    /// Disable forwarding entirely
    #[arg(long, conflicts_with = "forward_server")]
    no_forward: bool,

    /// Seconds between zone file checks
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Seconds to wait for the forward server
    #[arg(long, value_name = "SECS")]
    forward_timeout: Option<u64>,

    /// Maximum CNAME hops chased per question
    #[arg(long)]
    max_cname_depth: Option<usize>,

    /// CNAME chase strategy: in-process or loopback
    #[arg(long, value_name = "MODE")]
    cname_chase: Option<ChaseMode>,

    /// Change detection: poll or notify
    #[arg(long, value_name = "MODE")]
    watch_mode: Option<WatchMode>,

    /// Serve UDP only
    #[arg(long)]
    no_tcp: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)?,
            None => ServerConfig::default(),
        };
        config.apply_env()?;

        if let Some(zone_file) = self.zone_file {
            config.zone_file = zone_file;
        }
        if let Some(origin) = self.origin {
            config.origin = Some(origin);
        }
        if let Some(bind) = self.bind {
            config.bind_addr = parse_bind_addr(&bind)?;
        }
        if let Some(port) = self.port {
            config.bind_addr = SocketAddr::new(config.bind_addr.ip(), port);
        }
        if let Some(server) = self.forward_server {
            config.forward_server = parse_forward_server(&server)?;
        }
        if self.no_forward {
            config.forward_server = None;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.forward_timeout {
            config.forward_timeout = Duration::from_secs(secs);
        }
        if let Some(depth) = self.max_cname_depth {
            config.max_cname_depth = depth;
        }
        if let Some(mode) = self.cname_chase {
            config.cname_chase = mode;
        }
        if let Some(mode) = self.watch_mode {
            config.watch_mode = mode;
        }
        if self.no_tcp {
            config.enable_tcp = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    info!("Starting bifrost with zone {}", config.zone_file.display());

    let store = Arc::new(RecordStore::new());
    let loader = ZoneLoader::new(&config.zone_file, config.origin.as_deref());
    // No zone, no service
    load_initial(&loader, &store).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let watcher = build_watcher(&config, loader, store.clone());
    let watcher_handle = tokio::spawn(watcher.run(shutdown_tx.subscribe()));

    let engine = Arc::new(ResolutionEngine::new(&config, store));
    let server = DnsServer::bind(&config, engine).await?;
    match config.forward_server {
        Some(server) => info!("Forwarding unanswered queries to {}", server),
        None => info!("Forwarding disabled"),
    }

    let server_handle = tokio::spawn(server.run(shutdown_tx.subscribe()));

    wait_for_shutdown_signal().await;
    info!("Shutting down");
    // Receivers may already be gone if a task exited early
    let _ = shutdown_tx.send(());

    if let Err(e) = watcher_handle.await {
        warn!("Zone watcher task failed: {}", e);
    }
    server_handle
        .await
        .map_err(|e| DnsError::Io(format!("server task failed: {}", e)))?
}

fn build_watcher(config: &ServerConfig, loader: ZoneLoader, store: Arc<RecordStore>) -> ZoneWatcher {
    if config.watch_mode == WatchMode::Notify {
        match NotifyDetector::new(loader.path()) {
            Ok(detector) => {
                return ZoneWatcher::new(loader, store, Box::new(detector), config.poll_interval);
            }
            Err(e) => warn!("File notifications unavailable ({}), polling instead", e),
        }
    }
    ZoneWatcher::polling(loader, store, config.poll_interval)
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}
