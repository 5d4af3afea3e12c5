//! Log and error message strings used by the binary and the accept loop

// Startup
pub const MSG_BANNER: &str = "File Portal relay v";
pub const MSG_LISTENING: &str = "Listening on ";
pub const MSG_SHUTDOWN_RECEIVED: &str = "Shutdown signal received, closing listener";
pub const MSG_STOPPED: &str = "Relay stopped";

// Errors
pub const ERR_BIND_FAILED: &str = "Failed to bind ";
pub const ERR_ACCEPT: &str = "Failed to accept connection: ";
pub const ERR_CONNECTION: &str = "Connection error from ";

// Signals
#[cfg(unix)]
pub const ERR_SIGNAL_SIGTERM: &str = "Failed to install SIGTERM handler";
#[cfg(unix)]
pub const ERR_SIGNAL_SIGINT: &str = "Failed to install SIGINT handler";
#[cfg(not(unix))]
pub const ERR_SIGNAL_CTRLC: &str = "Failed to listen for Ctrl+C";

// Response bodies
pub const BODY_DELIVERED: &str = "delivered";
pub const BODY_EXPIRED: &str = "no downloader finished reading the upload in time";
pub const BODY_REPLACED: &str = "replaced by a newer upload under the same identifier";
pub const BODY_UNKNOWN_PATH: &str = "unknown path; transfers live under /files/{id}";
pub const BODY_METHOD_NOT_ALLOWED: &str = "only GET and PUT are supported";
pub const BODY_LENGTH_REQUIRED: &str = "uploads must declare Content-Length";
pub const BODY_CHUNKED_UNSUPPORTED: &str =
    "chunked uploads are not supported; declare Content-Length";
