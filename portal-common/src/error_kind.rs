//! Machine-readable error kinds for relay requests
//!
//! These error kinds are written as the body prefix of error responses,
//! allowing clients to tell a missing transfer apart from one that broke
//! mid-stream without parsing the human-readable text.

use std::fmt;

use crate::http::Status;

/// Error kinds surfaced by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No transfer is registered under the requested identifier
    ///
    /// Not retried: the uploader either never arrived, already finished,
    /// or was evicted.
    NotFound,

    /// Bytes stopped flowing after the download began
    ///
    /// Distinct from `NotFound` so a downloader knows the transfer existed.
    TransferFailed,

    /// The request was malformed (bad identifier, bad header value)
    Invalid,

    /// An upload arrived without a usable `Content-Length`
    LengthRequired,

    /// The path exists but not for this method
    MethodNotAllowed,

    /// The request head exceeded the size or line-count limits
    HeadTooLarge,

    /// The request head did not arrive in time
    Timeout,
}

impl ErrorKind {
    /// Convert to the string representation used in error bodies
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::TransferFailed => "transfer_failed",
            Self::Invalid => "invalid",
            Self::LengthRequired => "length_required",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::HeadTooLarge => "head_too_large",
            Self::Timeout => "timeout",
        }
    }

    /// HTTP status this kind is reported with
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound => Status::NotFound,
            Self::TransferFailed => Status::ExpectationFailed,
            Self::Invalid => Status::BadRequest,
            Self::LengthRequired => Status::LengthRequired,
            Self::MethodNotAllowed => Status::MethodNotAllowed,
            Self::HeadTooLarge => Status::HeaderFieldsTooLarge,
            Self::Timeout => Status::RequestTimeout,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
