//! Stale-entry reaper
//!
//! Periodically evicts records that no downloader has finished reading
//! within the entry TTL: `Pending` records nobody claimed, and `Failed`
//! records whose download broke. A record that is being streamed right now
//! (`Consumed`) is never touched, however old it is.
//!
//! Eviction releases the waiting uploader with `TransferOutcome::Expired`,
//! so an abandoned upload connection is closed instead of hanging forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::record::{TransferOutcome, TransferState};
use super::registry::TransferRegistry;

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default age after which an unread record is evicted
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(10 * 60);

/// Reaper timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperConfig {
    pub sweep_interval: Duration,
    pub entry_ttl: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            entry_ttl: DEFAULT_ENTRY_TTL,
        }
    }
}

pub struct Reaper {
    registry: Arc<TransferRegistry>,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(registry: Arc<TransferRegistry>, config: ReaperConfig) -> Self {
        Self { registry, config }
    }

    /// Run one sweep now
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Run one sweep as if the current time were `now`
    ///
    /// Returns the number of records evicted.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut evicted = 0;

        for record in self.registry.snapshot() {
            if record.age_at(now) < self.config.entry_ttl {
                continue;
            }

            // Losing either race means a downloader or a newer upload got
            // there first.
            let expired = record.transition(TransferState::Pending, TransferState::Expired)
                || record.transition(TransferState::Failed, TransferState::Expired);
            if !expired {
                continue;
            }

            self.registry.remove_if_same(&record);
            let released = record.signal(TransferOutcome::Expired);
            info!(
                identifier = %record.identifier,
                display_name = ?record.meta.display_name,
                released,
                "evicted stale transfer"
            );
            evicted += 1;
        }

        debug!(
            evicted,
            remaining = self.registry.active_count(),
            "reaper sweep complete"
        );
        evicted
    }

    /// Spawn the periodic sweep task
    ///
    /// The first sweep runs one interval after spawning. Abort the returned
    /// handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first tick (immediate)
            interval.tick().await;

            loop {
                interval.tick().await;
                self.sweep();
            }
        })
    }
}
