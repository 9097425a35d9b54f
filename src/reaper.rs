//! Deletes stale objects belonging to a tenant that has produced no index
//! and no recent objects.
//!
//! Invoked by the tenant poller's builder path whenever it finds zero live
//! and zero compacted blocks for a tenant.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::error::ReaperError;
use crate::ids::TenantId;
use crate::store::Store;

/// Attempts to reap `tenant`'s leftover objects. Returns `Ok(true)` if a
/// reap was performed, `Ok(false)` if it was skipped (disabled, tenant is
/// live-writing, or the index reappeared), and `Err` only for a
/// configuration error or a delete failure partway through.
pub async fn maybe_reap(
    store: &Arc<dyn Store>,
    tenant: &TenantId,
    cfg: &PollerConfig,
    cancel: &CancellationToken,
) -> Result<bool, ReaperError> {
    reap_at(store, tenant, cfg, now_unix_secs(), cancel).await
}

fn now_unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Same as [`maybe_reap`], but with an explicit "now", for deterministic
/// tests.
pub async fn reap_at(
    store: &Arc<dyn Store>,
    tenant: &TenantId,
    cfg: &PollerConfig,
    now_unix_secs: i64,
    cancel: &CancellationToken,
) -> Result<bool, ReaperError> {
    if !cfg.empty_tenant_deletion_enabled {
        return Ok(false);
    }
    if cfg.empty_tenant_deletion_age.is_zero() {
        return Err(ReaperError::ZeroDeletionAge);
    }

    let threshold_secs = cfg.empty_tenant_deletion_age.as_secs() as i64;
    let objects = store
        .find(tenant, "", cancel)
        .await
        .map_err(ReaperError::Find)?;

    let mut stale_keys = Vec::new();
    let mut recent_objects = 0usize;
    for object in objects {
        if now_unix_secs - object.modified_unix_secs >= threshold_secs {
            stale_keys.push(object.key);
        } else {
            recent_objects += 1;
        }
    }

    if recent_objects > 0 {
        tracing::debug!(%tenant, recent_objects, "tenant has recent objects, skipping reap");
        return Ok(false);
    }

    match store.read_tenant_index(tenant, cancel).await {
        Ok(_) => {
            tracing::debug!(%tenant, "tenant index reappeared, skipping reap");
            return Ok(false);
        }
        Err(err) if err.is_does_not_exist() => {}
        Err(err) => {
            tracing::debug!(%tenant, %err, "could not re-check tenant index, skipping reap");
            return Ok(false);
        }
    }

    for key in &stale_keys {
        store
            .delete(tenant, key, cancel)
            .await
            .map_err(ReaperError::Delete)?;
    }

    tracing::info!(%tenant, deleted = stale_keys.len(), "reaped empty tenant");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;

    fn tenant() -> TenantId {
        TenantId::new("t3").unwrap()
    }

    fn cfg() -> PollerConfig {
        PollerConfig {
            empty_tenant_deletion_enabled: true,
            empty_tenant_deletion_age: std::time::Duration::from_secs(24 * 60 * 60),
            ..PollerConfig::default()
        }
    }

    #[tokio::test]
    async fn reaps_all_stale_objects_with_no_index_and_no_recent_writes() {
        let mem = Arc::new(MemStore::new());
        let t = tenant();
        mem.put_object(&t, "a/meta.json", 0);
        mem.put_object(&t, "b/meta.json", 100);
        let store: Arc<dyn Store> = mem;

        let reaped = reap_at(&store, &t, &cfg(), 2 * 24 * 60 * 60, &CancellationToken::new())
            .await
            .unwrap();
        assert!(reaped);

        let remaining = store.find(&t, "", &CancellationToken::new()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn recent_objects_block_the_reap() {
        let now = 2 * 24 * 60 * 60;
        let mem = Arc::new(MemStore::new());
        let t = tenant();
        mem.put_object(&t, "a/meta.json", now - 10);
        let store: Arc<dyn Store> = mem;

        let reaped = reap_at(&store, &t, &cfg(), now, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!reaped);
        assert_eq!(store.find(&t, "", &CancellationToken::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reappeared_index_blocks_the_reap() {
        let mem = Arc::new(MemStore::new());
        let t = tenant();
        mem.put_object(&t, "a/meta.json", 0);
        mem.write_tenant_index(&t, &[], &[], &CancellationToken::new()).await.unwrap();
        let store: Arc<dyn Store> = mem;

        let reaped = reap_at(&store, &t, &cfg(), 2 * 24 * 60 * 60, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!reaped);
    }

    #[tokio::test]
    async fn zero_age_with_deletion_enabled_is_a_configuration_error() {
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let cfg = PollerConfig {
            empty_tenant_deletion_enabled: true,
            empty_tenant_deletion_age: std::time::Duration::ZERO,
            ..PollerConfig::default()
        };
        let err = reap_at(&store, &tenant(), &cfg, 0, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReaperError::ZeroDeletionAge));
    }
}
