//! Lookup service binary

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use imdb2meta::service::server::DEFAULT_SHUTDOWN_GRACE;
use imdb2meta::store::{OpenMode, StoreConfig};
use imdb2meta::{Service, ServiceConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for failures before the service was serving traffic.
const EXIT_STARTUP_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "imdb2meta-service")]
#[command(about = "Serves IMDb title metadata lookups over HTTP and gRPC")]
struct Args {
    /// Local interface address to bind to. "127.0.0.1" only allows access
    /// from the local host; "0.0.0.0" binds to all network interfaces.
    #[arg(long, default_value = "127.0.0.1")]
    bind_addr: IpAddr,

    /// Port to listen on for HTTP requests
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Port to listen on for gRPC requests
    #[arg(long, default_value_t = 8081)]
    grpc_port: u16,

    /// Path to the sled DB directory
    #[arg(long)]
    sled_path: Option<PathBuf>,

    /// Path to the RocksDB directory
    #[arg(long)]
    rocks_path: Option<PathBuf>,

    /// Open the store read-write instead of read-only
    #[arg(long)]
    read_write: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = match StoreConfig::from_paths(args.sled_path.clone(), args.rocks_path.clone()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "invalid store configuration");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };
    let config = ServiceConfig {
        http_addr: SocketAddr::new(args.bind_addr, args.http_port),
        grpc_addr: SocketAddr::new(args.bind_addr, args.grpc_port),
        store,
        open_mode: if args.read_write {
            OpenMode::ReadWrite
        } else {
            OpenMode::ReadOnly
        },
        shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
    };

    match Service::new(config).serve(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_startup_failure() => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
        Err(e) => {
            tracing::error!(error = %e, "service failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM (`docker stop`).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "couldn't install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
