//! Tenant blocklist polling core.
//!
//! This crate holds the part of the tenant block-indexing pipeline that
//! decides, for every tenant on every cycle, which blocks are live and
//! which are compacted, and publishes that view for query-time readers.
//! It owns no network listener and no scheduling loop of its own: a host
//! process is expected to call [`orchestrator::run_cycle`] on a timer (or
//! drive it through [`Poller`] below) and serve reads from the shared
//! [`blocklist::BlocklistState`].

pub mod blocklist;
pub mod concurrency;
pub mod config;
pub mod delta;
pub mod error;
pub mod ids;
pub mod meta;
pub mod metrics;
pub mod orchestrator;
pub mod reaper;
pub mod resolver;
pub mod sharder;
pub mod store;
pub mod tenant_poller;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

pub use blocklist::BlocklistState;
pub use config::PollerConfig;
pub use error::CycleError;
pub use ids::{BlockId, TenantId};
pub use sharder::Sharder;
pub use store::Store;

/// Drives repeated polling cycles against a [`BlocklistState`] on a fixed
/// period, until cancelled.
pub struct Poller {
    store: Arc<dyn Store>,
    sharder: Arc<dyn Sharder>,
    state: Arc<BlocklistState>,
    cfg: PollerConfig,
    period: Duration,
}

impl Poller {
    pub fn new(
        store: Arc<dyn Store>,
        sharder: Arc<dyn Sharder>,
        state: Arc<BlocklistState>,
        cfg: PollerConfig,
        period: Duration,
    ) -> Self {
        Self {
            store,
            sharder,
            state,
            cfg,
            period,
        }
    }

    pub fn state(&self) -> Arc<BlocklistState> {
        Arc::clone(&self.state)
    }

    /// Runs cycles back to back, sleeping `period` between the end of one
    /// and the start of the next, until `cancel` fires. A single failed
    /// cycle is logged and does not stop the loop; the previous snapshot
    /// remains published.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let now = now_unix_secs();
            if let Err(err) =
                orchestrator::run_cycle(&self.store, &self.sharder, &self.state, &self.cfg, now, &cancel)
                    .await
            {
                tracing::warn!(%err, "polling cycle failed, previous snapshot remains published");
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.period) => {}
            }
        }
    }
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
