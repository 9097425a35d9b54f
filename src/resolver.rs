//! Resolves block ids the delta computer couldn't classify from previous
//! state: parallel, bounded metadata fetches, each classified as live,
//! compacted, or transient/intermediate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::concurrency::Limiter;
use crate::config::PollerConfig;
use crate::ids::{BlockId, TenantId};
use crate::meta::{BlockMeta, CompactedBlockMeta};
use crate::store::{Store, StoreError};

/// The newly-resolved blocks for a tenant, split by classification.
#[derive(Debug, Default)]
pub struct Resolved {
    pub live: Vec<BlockMeta>,
    pub compacted: Vec<CompactedBlockMeta>,
}

enum Outcome {
    Live(BlockMeta),
    Compacted(CompactedBlockMeta),
    Dropped,
}

/// Resolves every entry in `unknown` (block id -> was the store's listing
/// compacted for this id), admitting each resolution task through `limiter`
/// (capacity `cfg.poll_concurrency`).
///
/// On any non-`DoesNotExist` error, resolution of the remaining unknowns is
/// short-circuited (entries already admitted are allowed to finish, no new
/// ones are admitted) and the joined error is returned; both output lists
/// from this call must then be discarded by the caller.
pub async fn resolve(
    store: &Arc<dyn Store>,
    tenant: &TenantId,
    unknown: HashMap<BlockId, bool>,
    limiter: &Limiter,
    cfg: &PollerConfig,
    cancel: &CancellationToken,
) -> Result<Resolved, StoreError> {
    let errors: Arc<Mutex<Vec<StoreError>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = tokio::task::JoinSet::new();

    for (id, was_compacted) in unknown {
        // Early-exit policy: a systemic failure already observed caps
        // further damage by skipping admission of new tasks.
        if !errors.lock().unwrap().is_empty() {
            break;
        }

        let _permit = limiter.admit().await;
        let store = Arc::clone(store);
        let tenant = tenant.clone();
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        let errors = Arc::clone(&errors);

        tasks.spawn(async move {
            // Hold the permit for the task's lifetime.
            let _permit = _permit;
            match resolve_one(&*store, &tenant, id, was_compacted, &cfg, &cancel).await {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    errors.lock().unwrap().push(err);
                    None
                }
            }
        });
    }

    let mut resolved = Resolved::default();
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.expect("resolver task panicked");
        match outcome {
            Some(Outcome::Live(meta)) => resolved.live.push(meta),
            Some(Outcome::Compacted(meta)) => resolved.compacted.push(meta),
            Some(Outcome::Dropped) | None => {}
        }
    }

    let mut errors = errors.lock().unwrap();
    if errors.is_empty() {
        Ok(resolved)
    } else {
        let joined = errors
            .drain(..)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(StoreError::Other(anyhow::anyhow!(
            "{} block resolution(s) failed: {joined}",
            joined.matches(';').count() + 1
        )))
    }
}

async fn resolve_one(
    store: &dyn Store,
    tenant: &TenantId,
    id: BlockId,
    was_listed_as_compacted: bool,
    cfg: &PollerConfig,
    cancel: &CancellationToken,
) -> Result<Outcome, StoreError> {
    if cfg.poll_jitter_ms > 0 {
        let sleep_ms = rand::thread_rng().gen_range(0..=cfg.poll_jitter_ms);
        tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
    }

    let listed_as_live = !was_listed_as_compacted;

    if cfg.skip_no_compact_blocks && listed_as_live {
        if store.has_no_compact_flag(tenant, id, cancel).await? {
            return Ok(Outcome::Dropped);
        }
    }

    if listed_as_live {
        match store.read_block_meta(tenant, id, cancel).await {
            Ok(meta) => return Ok(Outcome::Live(meta)),
            Err(err) if err.is_does_not_exist() => {
                // Fall through: the block may have since been compacted.
            }
            Err(err) => return Err(err),
        }
    }

    match store.read_compacted_block_meta(tenant, id, cancel).await {
        Ok(meta) => Ok(Outcome::Compacted(meta)),
        Err(err) if err.is_does_not_exist() => Ok(Outcome::Dropped),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    fn tenant() -> TenantId {
        TenantId::new("t1").unwrap()
    }

    fn meta(id: BlockId) -> BlockMeta {
        BlockMeta {
            block_id: id,
            start_time: 0,
            end_time: 1,
            total_objects: 1,
            size_bytes: 1,
            encoding: "none".into(),
            data_encoding: "v2".into(),
            bloom_shard_count: 1,
            index_page_size: 1024,
            total_records: 1,
            dedicated_columns: vec![],
        }
    }

    #[tokio::test]
    async fn resolves_live_and_compacted() {
        let mem = Arc::new(MemStore::new());
        let t = tenant();
        let live_id = BlockId::generate();
        let compacted_id = BlockId::generate();

        mem.put_live_block(&t, meta(live_id));
        mem.put_compacted_block(
            &t,
            CompactedBlockMeta {
                meta: meta(compacted_id),
                compacted_at: 1,
            },
        );
        let store: Arc<dyn Store> = mem;

        let mut unknown = HashMap::new();
        unknown.insert(live_id, false);
        unknown.insert(compacted_id, true);

        let limiter = Limiter::new(4);
        let cfg = PollerConfig::default();
        let cancel = CancellationToken::new();

        let resolved = resolve(&store, &t, unknown, &limiter, &cfg, &cancel)
            .await
            .unwrap();
        assert_eq!(resolved.live.len(), 1);
        assert_eq!(resolved.compacted.len(), 1);
    }

    #[tokio::test]
    async fn does_not_exist_is_dropped_silently() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let t = tenant();
        let mut unknown = HashMap::new();
        unknown.insert(BlockId::generate(), false);

        let limiter = Limiter::new(4);
        let cfg = PollerConfig::default();
        let cancel = CancellationToken::new();

        let resolved = resolve(&store, &t, unknown, &limiter, &cfg, &cancel)
            .await
            .unwrap();
        assert!(resolved.live.is_empty());
        assert!(resolved.compacted.is_empty());
    }
}
