//! PUT /files/{id}: publish the request body and hold the connection open
//! until a downloader has read all of it

use std::future::Future;
use std::io;

use portal_common::http::{BodyReader, CONTINUE_RESPONSE, RequestHead, ResponseHead, Status};
use portal_common::validators::{validate_display_name, validate_identifier};
use portal_common::{ErrorKind, NAME_HEADER};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::errors::{display_name_error_message, identifier_error_message, send_error};
use crate::constants::{
    BODY_CHUNKED_UNSUPPORTED, BODY_DELIVERED, BODY_EXPIRED, BODY_LENGTH_REQUIRED, BODY_REPLACED,
};
use crate::relay::{Rendezvous, TransferMeta, TransferOutcome, TransferSource};

/// Handle an upload request
///
/// `body` is the connection's read side positioned right after the request
/// head. It is handed to the relay, so nothing else reads from the
/// connection after this point. `cancel` resolving (server shutdown) drops
/// the connection without a response.
pub(crate) async fn handle_upload<R, W, F>(
    head: &RequestHead,
    identifier: &str,
    body: R,
    writer: &mut W,
    rendezvous: &Rendezvous,
    cancel: F,
) -> io::Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    if let Err(e) = validate_identifier(identifier) {
        return send_error(writer, ErrorKind::Invalid, identifier_error_message(&e)).await;
    }

    let display_name = match head.header(NAME_HEADER) {
        Some(name) => {
            if let Err(e) = validate_display_name(name) {
                return send_error(writer, ErrorKind::Invalid, display_name_error_message(&e))
                    .await;
            }
            (!name.is_empty()).then(|| name.to_string())
        }
        None => None,
    };

    if head.has_transfer_encoding() {
        return send_error(writer, ErrorKind::LengthRequired, BODY_CHUNKED_UNSUPPORTED).await;
    }

    let declared_length = match head.content_length() {
        Ok(Some(length)) => length,
        Ok(None) => {
            return send_error(writer, ErrorKind::LengthRequired, BODY_LENGTH_REQUIRED).await;
        }
        Err(e) => return send_error(writer, ErrorKind::Invalid, &e.to_string()).await,
    };

    if head.expects_continue() {
        writer.write_all(CONTINUE_RESPONSE).await?;
        writer.flush().await?;
    }

    let source: TransferSource = Box::new(BodyReader::new(body, declared_length));
    let meta = TransferMeta {
        declared_length,
        display_name,
    };
    let ticket = rendezvous.begin_upload(identifier, meta, source);

    let response = match ticket.wait_or_cancel(cancel).await {
        TransferOutcome::Consumed { bytes } => {
            ResponseHead::text(Status::Ok, &format!("{BODY_DELIVERED} {bytes} bytes\n"))
        }
        TransferOutcome::Expired => ResponseHead::text(
            Status::RequestTimeout,
            &format!("{}: {BODY_EXPIRED}\n", ErrorKind::Timeout),
        ),
        TransferOutcome::Replaced => {
            ResponseHead::text(Status::Conflict, &format!("replaced: {BODY_REPLACED}\n"))
        }
        TransferOutcome::Abandoned => {
            debug!(identifier, "upload abandoned, closing without a response");
            return Ok(());
        }
    };

    writer.write_all(&response).await?;
    writer.flush().await?;
    writer.shutdown().await
}
