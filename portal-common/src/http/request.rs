//! Request head reader

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::timeout;

use super::{MAX_HEAD_LENGTH, MAX_HEADER_COUNT};
use crate::ErrorKind;

/// Request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "PUT" => Self::Put,
            other => Self::Other(other.to_string()),
        }
    }

    /// Method token as it appears on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while reading a request head
#[derive(Debug)]
pub enum HeadError {
    /// Underlying I/O failure
    Io(io::Error),
    /// Head exceeded `MAX_HEAD_LENGTH` bytes or `MAX_HEADER_COUNT` lines
    TooLarge,
    /// Head did not arrive within the allowed time
    Timeout,
    /// Head was syntactically invalid
    Malformed(&'static str),
}

impl HeadError {
    /// Error kind to report to the client, if a response is still possible
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Io(_) => None,
            Self::TooLarge => Some(ErrorKind::HeadTooLarge),
            Self::Timeout => Some(ErrorKind::Timeout),
            Self::Malformed(_) => Some(ErrorKind::Invalid),
        }
    }
}

impl fmt::Display for HeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::TooLarge => write!(f, "request head too large"),
            Self::Timeout => write!(f, "timed out waiting for request head"),
            Self::Malformed(reason) => write!(f, "malformed request head: {reason}"),
        }
    }
}

impl std::error::Error for HeadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HeadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A parsed request line plus headers
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Request target exactly as sent (path plus optional query)
    pub target: String,
    pub version: String,
    /// Header lines in arrival order, names as sent
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// First value of the named header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Target with any query string removed
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Declared body length
    ///
    /// Repeated `Content-Length` headers are accepted only if they agree.
    pub fn content_length(&self) -> Result<Option<u64>, HeadError> {
        let mut length = None;
        for (_, value) in self
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        {
            let parsed = value
                .parse::<u64>()
                .map_err(|_| HeadError::Malformed("invalid Content-Length"))?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(HeadError::Malformed("conflicting Content-Length"));
                }
                _ => length = Some(parsed),
            }
        }
        Ok(length)
    }

    /// Whether the body uses a transfer coding (which the relay does not decode)
    pub fn has_transfer_encoding(&self) -> bool {
        self.header("transfer-encoding").is_some()
    }

    /// Whether the client waits for `100 Continue` before sending the body
    pub fn expects_continue(&self) -> bool {
        self.header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    }
}

/// Read a request head from a buffered stream
///
/// Returns `Ok(None)` if the connection is closed before any byte arrives.
/// Leading empty lines are skipped. The reader is left positioned at the
/// first body byte.
pub async fn read_request_head<R>(reader: &mut R) -> Result<Option<RequestHead>, HeadError>
where
    R: AsyncBufRead + Unpin,
{
    let mut consumed = 0usize;
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let remaining = (MAX_HEAD_LENGTH - consumed) as u64;
        let read = (&mut *reader)
            .take(remaining)
            .read_until(b'\n', &mut line)
            .await?;
        consumed += read;

        if read == 0 {
            if consumed == 0 {
                return Ok(None);
            }
            if remaining == 0 {
                return Err(HeadError::TooLarge);
            }
            return Err(HeadError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside request head",
            )));
        }

        if !line.ends_with(b"\n") {
            if consumed >= MAX_HEAD_LENGTH {
                return Err(HeadError::TooLarge);
            }
            return Err(HeadError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside request head",
            )));
        }

        let trimmed = trim_line_ending(&line);
        if trimmed.is_empty() {
            if lines.is_empty() {
                continue;
            }
            break;
        }

        if lines.len() > MAX_HEADER_COUNT {
            return Err(HeadError::TooLarge);
        }
        lines.push(trimmed.to_vec());
    }

    parse_head(&lines).map(Some)
}

/// Read a request head, failing with `HeadError::Timeout` if it takes too long
pub async fn read_request_head_with_timeout<R>(
    reader: &mut R,
    limit: Duration,
) -> Result<Option<RequestHead>, HeadError>
where
    R: AsyncBufRead + Unpin,
{
    match timeout(limit, read_request_head(reader)).await {
        Ok(result) => result,
        Err(_) => Err(HeadError::Timeout),
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_head(lines: &[Vec<u8>]) -> Result<RequestHead, HeadError> {
    let (request_line, header_lines) = lines
        .split_first()
        .ok_or(HeadError::Malformed("missing request line"))?;
    let request_line = std::str::from_utf8(request_line)
        .map_err(|_| HeadError::Malformed("request line is not valid UTF-8"))?;

    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HeadError::Malformed("invalid request line"));
    };

    if !version.starts_with("HTTP/1.") {
        return Err(HeadError::Malformed("unsupported HTTP version"));
    }
    if !target.starts_with('/') {
        return Err(HeadError::Malformed("request target must be a path"));
    }

    let mut headers = Vec::with_capacity(header_lines.len());
    for line in header_lines {
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(HeadError::Malformed("header line without colon"))?;
        let name = std::str::from_utf8(&line[..colon])
            .map_err(|_| HeadError::Malformed("header name is not valid UTF-8"))?;
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(HeadError::Malformed("invalid header name"));
        }
        let value = decode_field_value(&line[colon + 1..]);
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: Method::from_token(method),
        target: target.to_string(),
        version: version.to_string(),
        headers,
    })
}

/// Header values are taken as UTF-8 when they decode as such, otherwise as
/// ISO-8859-1 (one char per byte), so a legacy-encoded value never fails
/// the request
fn decode_field_value(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
    }
}
