use std::process::ExitCode;

use clap::Parser;
use memo_proxy::{Cache, Proxy};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Caching HTTP/1.0 forward proxy.
#[derive(Parser, Debug)]
#[command(name = "memo-proxy", version, about)]
struct Cli {
    /// TCP port to listen on.
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_proxy=info".into()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::FAILURE,
            };
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", cli.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to listen on port {}: {err}", cli.port);
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }

    let proxy = Proxy::new(Cache::new());
    let cache = proxy.cache().clone();
    tokio::select! {
        res = proxy.serve(listener) => {
            if let Err(err) = res {
                error!("server failed: {err:#}");
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!(stats = ?cache.stats(), "shutting down");
        }
    }
    ExitCode::SUCCESS
}
