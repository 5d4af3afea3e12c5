//! Request handlers for the `/files/{id}` route

mod download;
mod errors;
mod upload;

pub(crate) use download::handle_download;
pub(crate) use errors::{send_error, send_error_with_headers};
pub(crate) use upload::handle_upload;
