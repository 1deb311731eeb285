//! airclip binary.
//!
//! To test:
//!   curl -s -X POST -H "Authorization: Bearer local-use-only" \
//!        -d "testfromcurl" http://localhost:9123/notify

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use airclip::lifecycle::{self, EXIT_ERROR, EXIT_INTERRUPT, Shutdown};
use airclip::{AppState, Config, Server, logging, netinfo};

#[tokio::main]
async fn main() -> ExitCode {
    // clap's own usage-error code is 2, which is reserved for a forced exit.
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(EXIT_ERROR) } else { ExitCode::SUCCESS };
        }
    };

    let log_path = match logging::init(&config.log_dir) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    info!("Starting notification server (log file: {})", log_path.display());

    match run(config).await {
        Ok(()) => {
            info!("Server shutdown completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error running the server: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = Shutdown::new();
    let interrupts = lifecycle::os_interrupts().context("failed to install signal handlers")?;
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            lifecycle::supervise(interrupts, shutdown).await;
            std::process::exit(EXIT_INTERRUPT);
        }
    });

    if !config.local_only {
        warn!("WARNING: Running with local-only protection disabled. This is not recommended.");
    }

    let state = AppState::from_config(&config).context("invalid tool command")?;
    if state.policy.token().is_none() {
        warn!("WARNING: Token authentication disabled; any local client can post.");
    }
    let server = Server::bind(config.socket_addr()).await?;
    let addr = server.local_addr();

    netinfo::announce(addr.port());
    info!("Starting notification server on {addr} (LOCAL NETWORK USE ONLY)");

    server.serve(airclip::router(state), shutdown).await?;
    Ok(())
}
