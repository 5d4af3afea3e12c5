//! Response head writer

use std::fmt::Write as _;

/// Interim response sent to clients that asked for `Expect: 100-continue`
pub const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Response statuses the relay produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    Conflict,
    LengthRequired,
    ExpectationFailed,
    HeaderFieldsTooLarge,
}

impl Status {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::RequestTimeout => 408,
            Self::Conflict => 409,
            Self::LengthRequired => 411,
            Self::ExpectationFailed => 417,
            Self::HeaderFieldsTooLarge => 431,
        }
    }

    /// Canonical reason phrase
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::RequestTimeout => "Request Timeout",
            Self::Conflict => "Conflict",
            Self::LengthRequired => "Length Required",
            Self::ExpectationFailed => "Expectation Failed",
            Self::HeaderFieldsTooLarge => "Request Header Fields Too Large",
        }
    }
}

/// Status line plus headers of a response
///
/// Every response carries `Connection: close`; the relay never reuses a
/// connection for a second request.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: Status,
    headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Add a `Content-Length` header
    #[must_use]
    pub fn content_length(self, length: u64) -> Self {
        self.header("Content-Length", length.to_string())
    }

    /// A complete plain-text response: head plus body
    pub fn text(status: Status, body: &str) -> Vec<u8> {
        let mut bytes = Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .content_length(body.len() as u64)
            .encode();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    /// Serialize to wire bytes, including the terminating blank line
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(128);
        let _ = write!(
            out,
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        );
        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }
        out.push_str("Connection: close\r\n\r\n");
        out.into_bytes()
    }
}

/// Build a `Content-Disposition` value for a download
///
/// The display name is quoted with `"` and `\` escaped. Without a name the
/// value is a bare `attachment`.
pub fn content_disposition(display_name: Option<&str>) -> String {
    match display_name {
        Some(name) if !name.is_empty() => {
            let mut value = String::with_capacity(name.len() + 24);
            value.push_str("attachment; filename=\"");
            for ch in name.chars() {
                if ch == '"' || ch == '\\' {
                    value.push('\\');
                }
                value.push(ch);
            }
            value.push('"');
            value
        }
        _ => "attachment".to_string(),
    }
}
