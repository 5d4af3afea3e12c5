//! GET /files/{id}: stream a waiting upload to this connection

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use portal_common::ErrorKind;
use portal_common::http::{ResponseHead, Status, content_disposition};
use portal_common::validators::validate_identifier;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::errors::{identifier_error_message, send_error};
use crate::relay::{DownloadSink, Rendezvous, TransferMeta};

/// Response writer for a download
///
/// Remembers whether the 200 head has gone out, since after that point a
/// failure can only be reported by cutting the connection short.
pub(crate) struct HttpSink<'a, W> {
    writer: &'a mut W,
    head_sent: bool,
}

impl<'a, W> HttpSink<'a, W> {
    pub(crate) fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            head_sent: false,
        }
    }

    pub(crate) fn head_sent(&self) -> bool {
        self.head_sent
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for HttpSink<'_, W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().writer).poll_shutdown(cx)
    }
}

impl<W: AsyncWrite + Unpin + Send> DownloadSink for HttpSink<'_, W> {
    async fn send_head(&mut self, meta: &TransferMeta) -> io::Result<()> {
        let head = ResponseHead::new(Status::Ok)
            .content_length(meta.declared_length)
            .header("Content-Type", "application/octet-stream")
            .header(
                "Content-Disposition",
                content_disposition(meta.display_name.as_deref()),
            );

        // Any byte of the head on the wire commits the status
        self.head_sent = true;
        self.writer.write_all(&head.encode()).await
    }
}

/// Handle a download request
pub(crate) async fn handle_download<W>(
    identifier: &str,
    writer: &mut W,
    rendezvous: &Rendezvous,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    if let Err(e) = validate_identifier(identifier) {
        return send_error(writer, ErrorKind::Invalid, identifier_error_message(&e)).await;
    }

    let download = match rendezvous.begin_download(identifier) {
        Ok(download) => download,
        Err(e) => return send_error(writer, e.kind(), &e.to_string()).await,
    };

    let mut sink = HttpSink::new(writer);
    let result = download.stream_to(&mut sink).await;
    let head_sent = sink.head_sent();

    match result {
        Ok(_) => writer.shutdown().await,
        Err(e) if !head_sent => send_error(writer, e.kind(), &e.to_string()).await,
        Err(e) => {
            debug!(identifier, error = %e, "closing download mid-body");
            // The peer sees fewer bytes than Content-Length promised
            let _ = writer.shutdown().await;
            Ok(())
        }
    }
}
