//! Transfer registry: identifier → in-flight transfer record
//!
//! The single shared source of truth for which transfers exist. Upload
//! contexts publish into it, download contexts look up and retire from it,
//! and the reaper sweeps it, all without any lock beyond the map's own.
//! The lock is never held across an await or any I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::record::TransferRecord;

/// Registry of in-flight transfers keyed by identifier
///
/// Thread-safe registry that allows:
/// - Publishing a record (unconditional upsert, returning any displaced record)
/// - Looking up a record for download
/// - Retiring a record, either by identifier or only if it is still the
///   record published under that identifier
/// - Taking a snapshot for the reaper to iterate without holding the lock
pub struct TransferRegistry {
    transfers: Mutex<HashMap<String, Arc<TransferRecord>>>,
}

impl TransferRegistry {
    /// Create a new empty transfer registry
    pub fn new() -> Self {
        Self {
            transfers: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a record under its identifier
    ///
    /// Returns the record previously published under the same identifier,
    /// if any. Nothing is enforced about uniqueness; the caller decides what
    /// happens to the displaced record.
    pub fn put(&self, record: Arc<TransferRecord>) -> Option<Arc<TransferRecord>> {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .insert(record.identifier.clone(), record)
    }

    /// Look up the record published under `identifier`
    pub fn get(&self, identifier: &str) -> Option<Arc<TransferRecord>> {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .get(identifier)
            .cloned()
    }

    /// Remove whatever is published under `identifier` (idempotent)
    pub fn remove(&self, identifier: &str) -> Option<Arc<TransferRecord>> {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .remove(identifier)
    }

    /// Remove `record` only if it is still the one published under its identifier
    ///
    /// A record that was replaced while being streamed or swept must not
    /// take its successor down with it. Returns true if removed.
    pub fn remove_if_same(&self, record: &Arc<TransferRecord>) -> bool {
        let mut transfers = self
            .transfers
            .lock()
            .expect("transfer registry lock poisoned");
        match transfers.get(&record.identifier) {
            Some(current) if Arc::ptr_eq(current, record) => {
                transfers.remove(&record.identifier);
                true
            }
            _ => false,
        }
    }

    /// Whether anything is published under `identifier`
    pub fn contains(&self, identifier: &str) -> bool {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .contains_key(identifier)
    }

    /// Get a snapshot of all published records
    ///
    /// Returns cloned Arc references. Records published or removed after the
    /// snapshot was taken are not reflected in it.
    pub fn snapshot(&self) -> Vec<Arc<TransferRecord>> {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Get the number of published records
    pub fn active_count(&self) -> usize {
        self.transfers
            .lock()
            .expect("transfer registry lock poisoned")
            .len()
    }
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::new()
    }
}
