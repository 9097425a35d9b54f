//! The cycle orchestrator: lists tenants, fans each one out through a
//! bounded [`Limiter`], retries a tenant up to its consecutive-error
//! budget, tracks a separate cycle-wide failure budget, and publishes the
//! assembled result into a [`BlocklistState`].
//!
//! Two counters are kept deliberately distinct: a per-tenant retry budget
//! (`tolerate_consecutive_errors`, reset on success, exhausted abandons
//! just that tenant) and a per-cycle failure budget
//! (`tolerate_tenant_failures`, accumulates across tenants, exhausted
//! abandons the whole cycle). Collapsing them would let one flaky tenant
//! either starve its own retries against other tenants' failures, or let
//! unrelated tenants cancel each other's legitimate retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::blocklist::{BlocklistState, PerTenant, PerTenantCompacted};
use crate::concurrency::Limiter;
use crate::config::PollerConfig;
use crate::error::CycleError;
use crate::ids::TenantId;
use crate::metrics;
use crate::sharder::Sharder;
use crate::store::Store;
use crate::tenant_poller::{self, TenantOutcome};

/// Runs one polling cycle to completion against `state`, or fails without
/// touching it.
///
/// `now_unix_secs` is threaded through to every tenant so that staleness
/// and reap-age checks within a single cycle agree on the time, even if
/// the cycle runs for several seconds.
#[allow(clippy::too_many_arguments)]
pub async fn run_cycle(
    store: &Arc<dyn Store>,
    sharder: &Arc<dyn Sharder>,
    state: &BlocklistState,
    cfg: &PollerConfig,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Result<(), CycleError> {
    let started = Instant::now();

    let tenants = store
        .list_tenants(cancel)
        .await
        .map_err(CycleError::ListTenants)?;

    let tenant_limiter = Limiter::new(cfg.tenant_poll_concurrency);
    let block_limiter = Limiter::new(cfg.poll_concurrency);

    let failures_remaining = Arc::new(AtomicUsize::new(cfg.tolerate_tenant_failures));
    let results: Arc<Mutex<(PerTenant, PerTenantCompacted)>> =
        Arc::new(Mutex::new((PerTenant::new(), PerTenantCompacted::new())));
    let budget_exhausted = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let mut tasks = tokio::task::JoinSet::new();

    // Admission is gated on the parent cancellation handle, but once a
    // tenant task is admitted it runs against this independent background
    // token instead of the parent's. A cancelled parent stops the
    // orchestrator from admitting anyone new; it must not abort an
    // in-flight write and leave a tenant index half-written.
    let background = CancellationToken::new();

    for tenant in tenants {
        if cancel.is_cancelled() || budget_exhausted.load(Ordering::SeqCst) {
            break;
        }

        let previous_metas = state.metas(&tenant);
        let previous_compacted = state.compacted_metas(&tenant);

        let permit = tenant_limiter.admit().await;
        let store = Arc::clone(store);
        let sharder = Arc::clone(sharder);
        let cfg = cfg.clone();
        let block_limiter = block_limiter.clone();
        let task_cancel = background.clone();
        let failures_remaining = Arc::clone(&failures_remaining);
        let results = Arc::clone(&results);
        let budget_exhausted = Arc::clone(&budget_exhausted);

        tasks.spawn(async move {
            let _permit = permit;
            let outcome = poll_tenant_with_retries(
                &store,
                &*sharder,
                &tenant,
                &previous_metas,
                &previous_compacted,
                &cfg,
                &block_limiter,
                now_unix_secs,
                &task_cancel,
            )
            .await;

            match outcome {
                Some(outcome) => {
                    metrics::tenant_blocklist_gauges(
                        &tenant,
                        outcome.live.len(),
                        outcome.compacted.len(),
                        outcome.live.iter().map(|m| m.size_bytes).sum(),
                        outcome.compacted.iter().map(|m| m.meta.size_bytes).sum(),
                    );
                    metrics::tenant_builder_status(&tenant, outcome.executed_builder_path);
                    if let Some(age) = outcome.index_age_secs {
                        metrics::tenant_index_age(&tenant, age);
                    }
                    if outcome.index_write_failed {
                        metrics::tenant_index_write_error(&tenant);
                    }

                    let mut results = results.lock().unwrap();
                    results.0.insert(tenant.clone(), outcome.live);
                    results.1.insert(tenant, outcome.compacted);
                }
                None => {
                    metrics::tenant_poll_error(&tenant);
                    let previous = failures_remaining.fetch_update(
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                        |remaining| remaining.checked_sub(1),
                    );
                    if previous.is_err() {
                        budget_exhausted.store(true, Ordering::SeqCst);
                    }

                    // A tenant that fails every attempt carries its previous
                    // snapshot entry forward unchanged, rather than vanishing
                    // from the published result.
                    let mut results = results.lock().unwrap();
                    results.0.insert(tenant.clone(), previous_metas);
                    results.1.insert(tenant, previous_compacted);
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.expect("tenant task panicked");
    }

    if cancel.is_cancelled() {
        return Err(CycleError::Cancelled);
    }
    if budget_exhausted.load(Ordering::SeqCst) {
        return Err(CycleError::TooManyTenantFailures);
    }

    let (metas, compacted_metas) = Arc::try_unwrap(results)
        .expect("no outstanding references once every task has joined")
        .into_inner()
        .unwrap();
    state.apply(metas, compacted_metas);

    metrics::cycle_duration(started.elapsed());
    Ok(())
}

/// Retries a single tenant up to `tolerate_consecutive_errors + 1` total
/// attempts, sleeping briefly between attempts. Returns `None` once the
/// retry budget is exhausted; the caller charges this against the
/// cycle-wide failure budget.
#[allow(clippy::too_many_arguments)]
async fn poll_tenant_with_retries(
    store: &Arc<dyn Store>,
    sharder: &dyn Sharder,
    tenant: &TenantId,
    previous_metas: &[crate::meta::BlockMeta],
    previous_compacted: &[crate::meta::CompactedBlockMeta],
    cfg: &PollerConfig,
    block_limiter: &Limiter,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Option<TenantOutcome> {
    let max_attempts = cfg.tolerate_consecutive_errors + 1;

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return None;
        }

        match tenant_poller::poll_tenant(
            store,
            sharder,
            tenant,
            previous_metas,
            previous_compacted,
            cfg,
            block_limiter,
            now_unix_secs,
            cancel,
        )
        .await
        {
            Ok(outcome) => return Some(outcome),
            Err(err) => {
                tracing::warn!(%tenant, %err, attempt, "tenant poll attempt failed");
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharder::Fixed;
    use crate::store::mem::MemStore;

    fn cfg() -> PollerConfig {
        PollerConfig {
            tolerate_consecutive_errors: 1,
            tolerate_tenant_failures: 1,
            ..PollerConfig::default()
        }
    }

    #[tokio::test]
    async fn publishes_snapshot_on_success() {
        let mem = Arc::new(MemStore::new());
        let t = TenantId::new("t1").unwrap();
        mem.put_live_block(
            &t,
            crate::meta::BlockMeta {
                block_id: crate::ids::BlockId::generate(),
                start_time: 0,
                end_time: 1,
                total_objects: 1,
                size_bytes: 10,
                encoding: "none".into(),
                data_encoding: "v2".into(),
                bloom_shard_count: 1,
                index_page_size: 1024,
                total_records: 1,
                dedicated_columns: vec![],
            },
        );
        let store: Arc<dyn Store> = mem;
        let sharder: Arc<dyn Sharder> = Arc::new(Fixed::always_builder());
        let state = BlocklistState::new();

        run_cycle(&store, &sharder, &state, &cfg(), 0, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.metas(&t).len(), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_yields_cancelled_error() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let sharder: Arc<dyn Sharder> = Arc::new(Fixed::always_builder());
        let state = BlocklistState::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run_cycle(&store, &sharder, &state, &cfg(), 0, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CycleError::Cancelled));
    }
}
