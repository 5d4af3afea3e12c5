//! portald: File Portal relay binary

use std::sync::Arc;

use clap::Parser;
use portal_server::args::Args;
use portal_server::constants::*;
use portal_server::relay::{Reaper, Rendezvous, TransferRegistry};
use portal_server::server::{self, ServerParams};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    info!("{}{}", MSG_BANNER, env!("CARGO_PKG_VERSION"));

    let addr = args.listen_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}{}: {}", ERR_BIND_FAILED, addr, e);
            std::process::exit(1);
        }
    };
    info!("{}{}", MSG_LISTENING, addr);

    let registry = Arc::new(TransferRegistry::new());
    let reaper_config = args.reaper_config();
    info!(
        sweep_interval_secs = reaper_config.sweep_interval.as_secs(),
        entry_ttl_secs = reaper_config.entry_ttl.as_secs(),
        "reaper started"
    );
    let reaper_task = Reaper::new(Arc::clone(&registry), reaper_config).spawn();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let params = ServerParams {
        rendezvous: Rendezvous::new(Arc::clone(&registry)),
        head_timeout: args.head_timeout(),
        shutdown: shutdown_rx,
    };

    tokio::select! {
        () = setup_shutdown_signal() => info!("{}", MSG_SHUTDOWN_RECEIVED),
        () = server::serve(listener, params) => {}
    }

    let _ = shutdown_tx.send(true);
    reaper_task.abort();
    info!(pending = registry.active_count(), "{}", MSG_STOPPED);
}

/// Install the global subscriber; `RUST_LOG` wins over `--debug`
fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Wait for SIGTERM/SIGINT (Ctrl+C elsewhere)
async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).expect(ERR_SIGNAL_SIGTERM);
        let mut sigint = signal(SignalKind::interrupt()).expect(ERR_SIGNAL_SIGINT);

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect(ERR_SIGNAL_CTRLC);
    }
}
