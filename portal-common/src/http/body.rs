//! Exact-length request body reader

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Reads exactly `Content-Length` bytes of a request body
///
/// Yields EOF once the declared length has been read. If the peer closes
/// the connection before that, the read fails with `UnexpectedEof` rather
/// than reporting a short but apparently complete body.
pub struct BodyReader<R> {
    inner: Take<R>,
    declared: u64,
}

impl<R: AsyncRead + Unpin> BodyReader<R> {
    pub fn new(reader: R, declared: u64) -> Self {
        Self {
            inner: reader.take(declared),
            declared,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for BodyReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        let read = buf.filled().len() - before;

        if read == 0 && buf.remaining() > 0 && self.inner.limit() > 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "body closed with {} of {} bytes outstanding",
                    self.inner.limit(),
                    self.declared
                ),
            )));
        }

        Poll::Ready(Ok(()))
    }
}
