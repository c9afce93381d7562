//! Polling snapshot cache.
//!
//! Owns the most recent [`Snapshot`] and republishes it on a fixed interval
//! from a background task:
//!
//! ```text
//! SnapshotCache::initialize(builder)   (first build, fatal on error)
//!     └─► tokio::spawn(refresh_loop)   (every 5 s: build, then swap)
//!             └─► current()            (request handlers, never wait on a build)
//! ```
//!
//! The snapshot lives behind `RwLock<Arc<Snapshot>>`. A refresh builds the
//! new value outside the lock and only takes the write lock to swap the
//! pointer, so readers see either the old or the new snapshot in full.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::process::{Snapshot, SnapshotBuilder};

/// Default period between two process-table scans.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

pub struct SnapshotCache {
    builder: SnapshotBuilder,
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCache {
    /// Build the first snapshot and wrap it in a cache.
    ///
    /// Fails when the very first listing fails; there is nothing to serve
    /// without it.
    pub async fn initialize(builder: SnapshotBuilder) -> Result<Self> {
        let instances = builder.build().await?;
        info!(
            binary = builder.binary(),
            count = instances.len(),
            "initial snapshot captured"
        );
        Ok(Self {
            builder,
            current: RwLock::new(Arc::new(Snapshot::new(instances))),
        })
    }

    /// The most recently completed snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Run one scan and publish it. On failure the previous snapshot stays.
    pub async fn refresh_once(&self) -> Result<()> {
        match self.builder.build().await {
            Ok(instances) => {
                let snapshot = Arc::new(Snapshot::new(instances));
                debug!(count = snapshot.instances.len(), "snapshot refreshed");
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Refresh forever, once per `period`. The first scan happens one
    /// period after the call since `initialize` has just captured one.
    pub async fn refresh_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let _ = self.refresh_once().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
