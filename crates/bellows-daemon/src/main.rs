// Bellows build daemon entrypoint.

use anyhow::Result;
use bellows_daemon::{lifecycle, Server};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit codes for different scenarios
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const BIND_ERROR: i32 = 1;
    pub const RUNTIME_ERROR: i32 = 2;
}

#[derive(Debug, Parser)]
#[command(name = "bellows-daemon", about = "Bellows build daemon", version)]
struct Args {
    /// Socket path to listen on (defaults to the runtime directory)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Exit after this many seconds without client activity
    #[arg(long)]
    idle_timeout: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let socket = args.socket.unwrap_or_else(lifecycle::socket_path);

    info!(
        "Starting bellows-daemon v{} on {:?}",
        env!("CARGO_PKG_VERSION"),
        socket
    );

    let server = match bind(&socket, args.idle_timeout) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind daemon socket: {e:#}");
            process::exit(exit_codes::BIND_ERROR);
        }
    };

    match server.run().await {
        Ok(()) => {
            info!("Daemon exited");
            process::exit(exit_codes::SUCCESS);
        }
        Err(e) => {
            error!("Daemon failed: {e:#}");
            process::exit(exit_codes::RUNTIME_ERROR);
        }
    }
}

fn bind(socket: &std::path::Path, idle_timeout: Option<u64>) -> Result<Server> {
    let server = Server::bind(socket)?;
    Ok(match idle_timeout {
        Some(secs) => server.with_idle_timeout(Duration::from_secs(secs)),
        None => server,
    })
}
