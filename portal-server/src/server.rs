//! Accept loop

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::connection::{ConnectionParams, handle_connection, shutdown_requested};
use crate::constants::{ERR_ACCEPT, ERR_CONNECTION};
use crate::relay::Rendezvous;

/// Shared state handed to every connection
#[derive(Clone)]
pub struct ServerParams {
    pub rendezvous: Rendezvous,
    pub head_timeout: Duration,
    pub shutdown: watch::Receiver<bool>,
}

/// Accept connections until shutdown is requested
///
/// Each connection runs in its own task, so a waiting upload never blocks
/// the listener. Connections already in flight are not awaited on return;
/// waiting uploads see the same shutdown signal and close on their own.
pub async fn serve(listener: TcpListener, params: ServerParams) {
    let shutdown = shutdown_requested(params.shutdown.clone());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                debug!("accept loop stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, peer_addr)) => {
                    let conn_params = ConnectionParams {
                        peer_addr,
                        rendezvous: params.rendezvous.clone(),
                        head_timeout: params.head_timeout,
                        shutdown: params.shutdown.clone(),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, conn_params).await {
                            log_connection_error(&e, peer_addr);
                        }
                    });
                }
                Err(e) => error!("{}{}", ERR_ACCEPT, e),
            }
        }
    }
}

/// Log an error from a connection task
///
/// Peers hanging up mid-exchange are routine and only logged at debug.
fn log_connection_error(error: &io::Error, peer_addr: SocketAddr) {
    match error.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => {
            debug!("{}{}: {}", ERR_CONNECTION, peer_addr, error);
        }
        _ => warn!("{}{}: {}", ERR_CONNECTION, peer_addr, error),
    }
}
