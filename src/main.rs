//! MangleSocks - SOCKS5 proxy with traffic-shape obfuscation
//!
//! This is the main entry point for the MangleSocks application.

use anyhow::{Context, Result};
use clap::Parser;
use manglesocks::config::{load_config, Config};
use manglesocks::interceptor::{self, create_factory};
use manglesocks::server::{DefaultConnectionFactory, DefaultProxyFactory, SocksServer};
use manglesocks::transport::{DirectConnector, SocketOpts, TcpClientListener};
use manglesocks::BufferPool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// MangleSocks - SOCKS5 proxy with UDP relay and decoy obfuscation
#[derive(Parser, Debug)]
#[command(name = "manglesocks")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configuration
    #[arg(short, long)]
    listen: Option<String>,

    /// UDP interceptor name, overrides the configuration
    #[arg(short, long)]
    udp_mode: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Print the available UDP interceptors and exit
    #[arg(long)]
    list_udp_modes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_udp_modes {
        for descriptor in interceptor::INTERCEPTORS {
            println!("{:<30} {}", descriptor.name, descriptor.description);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(mode) = args.udp_mode {
        config.udp.interceptor = mode;
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level;
    }

    // Setup logging
    setup_logging(&config.server.log_level, args.json_log)?;

    config.validate()?;

    info!("MangleSocks v{}", manglesocks::VERSION);
    if let Some(path) = &args.config {
        info!("Configuration loaded from: {:?}", path);
    }
    info!("UDP interceptor: {}", config.udp.interceptor);

    let server = build_server(&config)?;
    server.start().await?;

    wait_for_shutdown().await;
    server.dispose().await;
    Ok(())
}

/// Wire the listener, connector, interceptors and factories together
fn build_server(config: &Config) -> Result<SocksServer> {
    let pool = BufferPool::new();
    let listen = config
        .server
        .listen_addr()
        .map_err(anyhow::Error::msg)?;

    let listener = TcpClientListener::bind(listen, SocketOpts::from_config(&config.server))
        .with_context(|| format!("Failed to listen on {}", listen))?;
    let interceptors = create_factory(&config.udp, &pool)?;
    let proxies = DefaultProxyFactory::new(
        Arc::new(DirectConnector::from_config(&config.server)),
        interceptors,
        pool.clone(),
    );
    let connections = DefaultConnectionFactory::new(Arc::new(proxies), pool);

    Ok(SocksServer::new(Arc::new(listener), Arc::new(connections)))
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down...");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down...");
                    }
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to setup SIGTERM handler: {}", e),
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down...");
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
