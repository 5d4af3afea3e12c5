//! Rendezvous relay core
//!
//! Pairs one uploader with one downloader per identifier and moves bytes
//! between them without buffering the payload:
//!
//! 1. Uploader: `Rendezvous::begin_upload` publishes a `TransferRecord` into
//!    the `TransferRegistry` and returns an `UploadTicket` to wait on
//! 2. Downloader: `Rendezvous::begin_download` claims the record, then
//!    `Download::stream_to` relays the source into the downloader's sink
//! 3. On the last byte the uploader is released and the record retired
//! 4. Meanwhile the `Reaper` evicts records nobody finished reading in time
//!
//! The core knows nothing about HTTP; the transport supplies the source
//! stream and a `DownloadSink`.

mod error;
mod reaper;
mod record;
mod registry;
mod rendezvous;

pub use error::RelayError;
pub use reaper::{DEFAULT_ENTRY_TTL, DEFAULT_SWEEP_INTERVAL, Reaper, ReaperConfig};
pub use record::{TransferMeta, TransferOutcome, TransferRecord, TransferSource, TransferState};
pub use registry::TransferRegistry;
pub use rendezvous::{Download, DownloadReport, DownloadSink, Rendezvous, UploadTicket};
