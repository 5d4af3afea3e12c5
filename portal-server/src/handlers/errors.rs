//! Error responses

use std::io;

use portal_common::ErrorKind;
use portal_common::http::ResponseHead;
use portal_common::validators::{DisplayNameError, IdentifierError};
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub(crate) const ERR_IDENTIFIER_EMPTY: &str = "transfer identifier is empty";
pub(crate) const ERR_IDENTIFIER_TOO_LONG: &str = "transfer identifier is longer than 256 bytes";
pub(crate) const ERR_IDENTIFIER_INVALID: &str =
    "transfer identifier contains '/', whitespace, or control characters";
pub(crate) const ERR_NAME_TOO_LONG: &str = "Name header is longer than 255 bytes";
pub(crate) const ERR_NAME_CONTROL: &str = "Name header contains control characters";

pub(crate) fn identifier_error_message(error: &IdentifierError) -> &'static str {
    match error {
        IdentifierError::Empty => ERR_IDENTIFIER_EMPTY,
        IdentifierError::TooLong => ERR_IDENTIFIER_TOO_LONG,
        IdentifierError::InvalidCharacters => ERR_IDENTIFIER_INVALID,
    }
}

pub(crate) fn display_name_error_message(error: &DisplayNameError) -> &'static str {
    match error {
        DisplayNameError::TooLong => ERR_NAME_TOO_LONG,
        DisplayNameError::ContainsControl => ERR_NAME_CONTROL,
    }
}

/// Body of an error response: `<kind>: <detail>`
pub(crate) fn error_body(kind: ErrorKind, detail: &str) -> String {
    format!("{kind}: {detail}\n")
}

/// Write a plain-text error response and close the write side
pub(crate) async fn send_error<W>(writer: &mut W, kind: ErrorKind, detail: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    send_error_with_headers(writer, kind, detail, &[]).await
}

/// Like `send_error`, with extra headers (e.g. `Allow`)
pub(crate) async fn send_error_with_headers<W>(
    writer: &mut W,
    kind: ErrorKind,
    detail: &str,
    extra: &[(&str, &str)],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = error_body(kind, detail);
    let mut head = ResponseHead::new(kind.status());
    for (name, value) in extra {
        head = head.header(name, *value);
    }
    let head = head
        .header("Content-Type", "text/plain; charset=utf-8")
        .content_length(body.len() as u64);

    writer.write_all(&head.encode()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await
}
