//! Poller configuration surface. Plain scalars, deserialisable from
//! whatever format the host process prefers (TOML/JSON/env); every knob
//! carries a sensible default so a partial document still deserialises.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_poll_concurrency() -> usize {
    16
}

fn default_tenant_poll_concurrency() -> usize {
    64
}

fn default_tenant_index_builders() -> usize {
    2
}

fn default_tolerate_consecutive_errors() -> usize {
    3
}

fn default_tolerate_tenant_failures() -> usize {
    0
}

fn default_empty_tenant_deletion_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Recognized poller configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Max parallel block-meta fetches within one tenant.
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    /// Max parallel tenants per cycle.
    #[serde(default = "default_tenant_poll_concurrency")]
    pub tenant_poll_concurrency: usize,

    /// If true, a failed index pull falls back to full polling; otherwise
    /// the tenant fails.
    #[serde(default)]
    pub poll_fallback: bool,

    /// Number of advisory builder slots per tenant (typically 1-2).
    #[serde(default = "default_tenant_index_builders")]
    pub tenant_index_builders: usize,

    /// Max age of a pulled index before it is considered stale. Zero
    /// disables the check.
    #[serde(default, with = "humantime_serde")]
    pub stale_tenant_index: Duration,

    /// Per-task randomised sleep, in milliseconds, before an object-store
    /// call, to smear load.
    #[serde(default)]
    pub poll_jitter_ms: u64,

    /// Retries for one tenant's poll before giving up.
    #[serde(default = "default_tolerate_consecutive_errors")]
    pub tolerate_consecutive_errors: usize,

    /// Per-cycle budget of failed tenants before the cycle is abandoned.
    #[serde(default = "default_tolerate_tenant_failures")]
    pub tolerate_tenant_failures: usize,

    #[serde(default)]
    pub empty_tenant_deletion_enabled: bool,

    #[serde(default = "default_empty_tenant_deletion_age", with = "humantime_serde")]
    pub empty_tenant_deletion_age: Duration,

    /// If true, blocks carrying a "no-compact" marker are excluded from the
    /// live list.
    #[serde(default)]
    pub skip_no_compact_blocks: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_concurrency: default_poll_concurrency(),
            tenant_poll_concurrency: default_tenant_poll_concurrency(),
            poll_fallback: false,
            tenant_index_builders: default_tenant_index_builders(),
            stale_tenant_index: Duration::ZERO,
            poll_jitter_ms: 0,
            tolerate_consecutive_errors: default_tolerate_consecutive_errors(),
            tolerate_tenant_failures: default_tolerate_tenant_failures(),
            empty_tenant_deletion_enabled: false,
            empty_tenant_deletion_age: default_empty_tenant_deletion_age(),
            skip_no_compact_blocks: false,
        }
    }
}
