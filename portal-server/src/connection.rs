//! Per-connection handling: read one request head, route it, respond

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use portal_common::http::{Method, read_request_head_with_timeout};
use portal_common::{ErrorKind, FILES_ROUTE_PREFIX};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{Instrument, debug, info_span};

use crate::constants::{BODY_METHOD_NOT_ALLOWED, BODY_UNKNOWN_PATH};
use crate::handlers::{handle_download, handle_upload, send_error, send_error_with_headers};
use crate::relay::Rendezvous;

/// Everything a connection task needs
pub struct ConnectionParams {
    pub peer_addr: SocketAddr,
    pub rendezvous: Rendezvous,
    pub head_timeout: Duration,
    pub shutdown: watch::Receiver<bool>,
}

/// Handle one client connection
///
/// The relay serves exactly one request per connection. Every response
/// carries `Connection: close` and the socket is dropped afterwards.
pub async fn handle_connection(socket: TcpStream, params: ConnectionParams) -> io::Result<()> {
    let span = info_span!(
        "conn",
        tag = %generate_connection_tag(),
        peer = %params.peer_addr
    );
    async move {
        debug!("connection accepted");
        let result = serve_request(socket, params).await;
        debug!(ok = result.is_ok(), "connection closed");
        result
    }
    .instrument(span)
    .await
}

async fn serve_request(socket: TcpStream, params: ConnectionParams) -> io::Result<()> {
    let ConnectionParams {
        peer_addr: _,
        rendezvous,
        head_timeout,
        shutdown,
    } = params;

    let (read_half, mut writer) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    let head = match read_request_head_with_timeout(&mut reader, head_timeout).await {
        Ok(Some(head)) => head,
        Ok(None) => {
            debug!("closed before sending a request");
            return Ok(());
        }
        Err(e) => {
            debug!(error = %e, "unusable request head");
            return match e.kind() {
                Some(kind) => send_error(&mut writer, kind, &e.to_string()).await,
                None => Ok(()),
            };
        }
    };

    debug!(method = %head.method, target = %head.target, "request");

    let Some(identifier) = files_route_identifier(head.path()) else {
        return send_error(&mut writer, ErrorKind::NotFound, BODY_UNKNOWN_PATH).await;
    };

    match head.method {
        Method::Put => {
            handle_upload(
                &head,
                identifier,
                reader,
                &mut writer,
                &rendezvous,
                shutdown_requested(shutdown),
            )
            .await
        }
        Method::Get => handle_download(identifier, &mut writer, &rendezvous).await,
        Method::Other(_) => {
            send_error_with_headers(
                &mut writer,
                ErrorKind::MethodNotAllowed,
                BODY_METHOD_NOT_ALLOWED,
                &[("Allow", "GET, PUT")],
            )
            .await
        }
    }
}

/// Extract `{id}` from `/files/{id}`
///
/// Only a single non-empty segment matches; anything else is not a route
/// this server knows.
fn files_route_identifier(path: &str) -> Option<&str> {
    path.strip_prefix(FILES_ROUTE_PREFIX)
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

/// Resolve once the server starts shutting down
///
/// A dropped sender means nobody will ever ask for shutdown, so this never
/// resolves in that case.
pub(crate) async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Short random tag correlating the log lines of one connection
fn generate_connection_tag() -> String {
    use rand::RngExt;
    let bytes: [u8; 4] = rand::rng().random();
    hex::encode(bytes)
}
