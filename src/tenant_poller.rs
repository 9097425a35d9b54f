//! Per-tenant orchestration: decide builder vs follower, pull the index or
//! rebuild it, write it back, and detect empty tenants.
//!
//! A single attempt lives here; the retry loop that wraps it belongs to the
//! [`crate::orchestrator`], which keeps the per-tenant retry budget and the
//! per-cycle failure budget as two separate counters.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::concurrency::Limiter;
use crate::config::PollerConfig;
use crate::delta;
use crate::error::TenantPollError;
use crate::ids::TenantId;
use crate::meta::{BlockMeta, CompactedBlockMeta};
use crate::reaper;
use crate::sharder::{self, Sharder};
use crate::store::Store;

/// The result of successfully polling one tenant once.
#[derive(Debug)]
pub struct TenantOutcome {
    pub live: Vec<BlockMeta>,
    pub compacted: Vec<CompactedBlockMeta>,
    /// Whether this attempt executed the builder path (either because the
    /// sharder designated this instance a builder, or because the follower
    /// path fell back to it).
    pub executed_builder_path: bool,
    /// Age of the pulled index in seconds, when the follower path was used
    /// successfully.
    pub index_age_secs: Option<i64>,
    /// Set when the builder path ran but `write_tenant_index` failed. This
    /// is intentionally non-fatal: the in-memory result from this attempt
    /// is still good, and the next builder attempt will retry the write.
    pub index_write_failed: bool,
}

/// Polls `tenant` once: decides builder vs follower and returns the
/// resulting block lists, or an error if this attempt failed outright.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip_all, fields(tenant = %tenant))]
pub async fn poll_tenant(
    store: &Arc<dyn Store>,
    sharder: &dyn Sharder,
    tenant: &TenantId,
    previous_metas: &[BlockMeta],
    previous_compacted: &[CompactedBlockMeta],
    cfg: &PollerConfig,
    block_limiter: &Limiter,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Result<TenantOutcome, TenantPollError> {
    let is_builder = sharder::is_builder(sharder, tenant, cfg.tenant_index_builders);

    if !is_builder {
        match try_follow(store, tenant, cfg, now_unix_secs, cancel).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => {
                if !cfg.poll_fallback {
                    return Err(err);
                }
                tracing::warn!(%tenant, %err, "index pull failed, falling back to full poll");
            }
        }
    }

    build_tenant_index(
        store,
        tenant,
        previous_metas,
        previous_compacted,
        cfg,
        block_limiter,
        now_unix_secs,
        cancel,
    )
    .await
}

async fn try_follow(
    store: &Arc<dyn Store>,
    tenant: &TenantId,
    cfg: &PollerConfig,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Result<TenantOutcome, TenantPollError> {
    let index = store
        .read_tenant_index(tenant, cancel)
        .await
        .map_err(TenantPollError::IndexPull)?;

    let age_secs = now_unix_secs - index.created_at;
    if !cfg.stale_tenant_index.is_zero() && age_secs as u64 > cfg.stale_tenant_index.as_secs() {
        return Err(TenantPollError::StaleIndex);
    }

    Ok(TenantOutcome {
        live: index.metas,
        compacted: index.compacted_metas,
        executed_builder_path: false,
        index_age_secs: Some(age_secs),
        index_write_failed: false,
    })
}

#[allow(clippy::too_many_arguments)]
async fn build_tenant_index(
    store: &Arc<dyn Store>,
    tenant: &TenantId,
    previous_metas: &[BlockMeta],
    previous_compacted: &[CompactedBlockMeta],
    cfg: &PollerConfig,
    block_limiter: &Limiter,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Result<TenantOutcome, TenantPollError> {
    let listing = store
        .list_blocks(tenant, cancel)
        .await
        .map_err(TenantPollError::ListBlocks)?;

    let delta = delta::compute(previous_metas, previous_compacted, &listing);

    let resolved = crate::resolver::resolve(store, tenant, delta.unknown, block_limiter, cfg, cancel)
        .await
        .map_err(TenantPollError::Resolve)?;

    let mut live = delta.known_live;
    live.extend(resolved.live);
    let mut compacted = delta.known_compacted;
    compacted.extend(resolved.compacted);

    // An empty result means this tenant may be a reap candidate. Writing an
    // empty index here would make the reaper's own read-back immediately
    // see it and refuse to delete, so the write is skipped in favor of
    // attempting the reap instead; if the tenant starts producing blocks
    // again, a later cycle writes a real index as usual.
    let index_write_failed = if live.is_empty() && compacted.is_empty() {
        if let Err(err) = reaper::reap_at(store, tenant, cfg, now_unix_secs, cancel).await {
            tracing::warn!(%tenant, %err, "empty-tenant reap did not complete");
        }
        false
    } else {
        match store.write_tenant_index(tenant, &live, &compacted, cancel).await {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(%tenant, %err, "failed to write tenant index (will retry next builder attempt)");
                true
            }
        }
    };

    Ok(TenantOutcome {
        live,
        compacted,
        executed_builder_path: true,
        index_age_secs: None,
        index_write_failed,
    })
}
