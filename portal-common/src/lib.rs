//! File Portal Common Library
//!
//! Wire vocabulary, validators, and utilities shared by the relay server and
//! any client that speaks to it.

mod error_kind;
pub mod hash;
pub mod http;
pub mod validators;

pub use error_kind::ErrorKind;

/// Default port for the relay's HTTP listener
pub const DEFAULT_PORT: u16 = 8080;

/// Path prefix under which transfers are addressed (`/files/{id}`)
pub const FILES_ROUTE_PREFIX: &str = "/files/";

/// Request header carrying the uploader's display name
pub const NAME_HEADER: &str = "Name";

/// Buffer size for relaying bytes from an uploader to a downloader (64KB)
pub const RELAY_CHUNK_SIZE: usize = 64 * 1024;
