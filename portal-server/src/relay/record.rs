//! Transfer record: one upload waiting for its downloader
//!
//! A record owns the uploader's body stream until a downloader takes it, and
//! the sending half of the oneshot the uploader is waiting on. Both are
//! wrapped in `Mutex<Option<>>` since each is taken exactly once.
//!
//! Retirement is decided by a single atomic state tag rather than by a flag
//! that two parties check and then act on. Whoever wins the compare-and-set
//! out of `Pending` owns the record's fate:
//!
//! ```text
//! Pending ──claim──▶ Consumed ──stream error──▶ Failed
//!    │                                            │
//!    ├──reaper──▶ Expired ◀──────reaper───────────┘
//!    └──re-upload──▶ Replaced
//! ```

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// The uploader's body stream, as handed to the relay
pub type TransferSource = Box<dyn AsyncRead + Send + Unpin>;

/// Advisory metadata reported by the uploader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferMeta {
    /// Byte count the uploader declared (echoed to the downloader, not enforced)
    pub declared_length: u64,
    /// Human-readable file name, echoed to the downloader
    pub display_name: Option<String>,
}

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferState {
    /// Published, no downloader yet
    Pending = 0,
    /// A downloader claimed the source and is streaming it
    Consumed = 1,
    /// The download broke mid-stream; left for the reaper
    Failed = 2,
    /// Evicted by the reaper
    Expired = 3,
    /// Displaced by a newer upload under the same identifier
    Replaced = 4,
}

impl TransferState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Consumed,
            2 => Self::Failed,
            3 => Self::Expired,
            _ => Self::Replaced,
        }
    }

    /// Whether a downloader has ever claimed the record
    pub fn is_accessed(self) -> bool {
        matches!(self, Self::Consumed | Self::Failed)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Consumed => write!(f, "consumed"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
            Self::Replaced => write!(f, "replaced"),
        }
    }
}

/// How a waiting upload was released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// A downloader read the whole source
    Consumed { bytes: u64 },
    /// The reaper evicted the record before anyone finished reading it
    Expired,
    /// A newer upload took over the identifier; this source was never read
    Replaced,
    /// The record was dropped without a decision, or the wait was cancelled
    Abandoned,
}

/// One in-flight transfer
pub struct TransferRecord {
    pub identifier: String,
    pub meta: TransferMeta,
    pub created_at: Instant,
    state: AtomicU8,
    source: Mutex<Option<TransferSource>>,
    completion_tx: Mutex<Option<oneshot::Sender<TransferOutcome>>>,
}

impl TransferRecord {
    /// Create a pending record and the receiver its uploader waits on
    pub fn new(
        identifier: String,
        meta: TransferMeta,
        source: TransferSource,
    ) -> (Self, oneshot::Receiver<TransferOutcome>) {
        let (completion_tx, completion_rx) = oneshot::channel();
        let record = Self {
            identifier,
            meta,
            created_at: Instant::now(),
            state: AtomicU8::new(TransferState::Pending as u8),
            source: Mutex::new(Some(source)),
            completion_tx: Mutex::new(Some(completion_tx)),
        };
        (record, completion_rx)
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        TransferState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether a downloader has claimed this record
    pub fn is_accessed(&self) -> bool {
        self.state().is_accessed()
    }

    /// Time since registration, as seen at `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Atomically move from `from` to `to`
    ///
    /// Returns false if the record was not in `from`, i.e. another party
    /// already decided its fate.
    pub(crate) fn transition(&self, from: TransferState, to: TransferState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the source stream out of the record (succeeds once)
    pub(crate) fn take_source(&self) -> Option<TransferSource> {
        self.source.lock().expect("source lock poisoned").take()
    }

    /// Release the waiting uploader (takes ownership of the sender)
    ///
    /// Returns true if the outcome was delivered, false if already signalled
    /// or the uploader stopped waiting.
    pub(crate) fn signal(&self, outcome: TransferOutcome) -> bool {
        let mut guard = self
            .completion_tx
            .lock()
            .expect("completion lock poisoned");
        if let Some(tx) = guard.take() {
            tx.send(outcome).is_ok()
        } else {
            false
        }
    }
}

impl fmt::Debug for TransferRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRecord")
            .field("identifier", &self.identifier)
            .field("meta", &self.meta)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish()
    }
}
