//! Relay error type

use std::fmt;
use std::io;

use portal_common::ErrorKind;

/// Errors surfaced by the rendezvous core
///
/// Both are terminal for the one transfer they concern and never affect
/// other identifiers. There is no retry anywhere in the core.
#[derive(Debug)]
pub enum RelayError {
    /// No claimable record exists for the identifier at lookup time
    NotFound { identifier: String },
    /// An I/O fault occurred after the download began
    TransferFailed {
        identifier: String,
        /// Bytes that reached the sink before the fault
        bytes_relayed: u64,
        source: io::Error,
    },
}

impl RelayError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Machine-readable kind, used to pick the response status
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::NotFound { identifier } | Self::TransferFailed { identifier, .. } => identifier,
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { identifier } => {
                write!(f, "no transfer registered for '{identifier}'")
            }
            Self::TransferFailed {
                identifier,
                bytes_relayed,
                source,
            } => write!(
                f,
                "transfer '{identifier}' failed after {bytes_relayed} bytes: {source}"
            ),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::TransferFailed { source, .. } => Some(source),
        }
    }
}
