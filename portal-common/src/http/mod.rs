//! Minimal HTTP/1.1 wire handling for the relay
//!
//! The relay speaks exactly one request per connection, so this module only
//! covers what that needs: reading a request head with hard limits, writing
//! a response head, and bounding a request body to its declared length.
//! Everything after the head is raw bytes handed to the caller.

mod body;
mod request;
mod response;

use std::time::Duration;

pub use body::BodyReader;
pub use request::{
    HeadError, Method, RequestHead, read_request_head, read_request_head_with_timeout,
};
pub use response::{CONTINUE_RESPONSE, ResponseHead, Status, content_disposition};

/// Maximum size of a request head (request line plus headers)
pub const MAX_HEAD_LENGTH: usize = 16 * 1024;

/// Maximum number of header lines in a request head
pub const MAX_HEADER_COUNT: usize = 64;

/// Default time a client has to send its complete request head
pub const DEFAULT_HEAD_TIMEOUT: Duration = Duration::from_secs(30);
