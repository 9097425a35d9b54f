//! An in-memory [`Store`] double used by this crate's own tests and
//! available to downstream integration tests that want to exercise the
//! poller without a real object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::{BlockListing, ObjectListing, Store, StoreError};
use crate::ids::{BlockId, TenantId};
use crate::meta::{BlockMeta, CompactedBlockMeta, TenantIndex};

#[derive(Default)]
struct TenantState {
    live: HashMap<BlockId, BlockMeta>,
    compacted: HashMap<BlockId, CompactedBlockMeta>,
    no_compact: std::collections::HashSet<BlockId>,
    index: Option<TenantIndex>,
    /// Extra keys under the tenant's subtree with a modification time,
    /// for reaper tests (e.g. leftover fragments with no surviving meta).
    objects: HashMap<String, i64>,
}

#[derive(Default)]
struct Inner {
    tenants: HashMap<TenantId, TenantState>,
}

/// A simple, fully in-memory [`Store`] implementation guarded by a single
/// mutex. Good enough for unit and integration tests; not meant for
/// production use.
pub struct MemStore {
    inner: Mutex<Inner>,
    now: AtomicI64,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            now: AtomicI64::new(0),
        }
    }

    pub fn set_now(&self, unix_secs: i64) {
        self.now.store(unix_secs, Ordering::SeqCst);
    }

    pub fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    pub fn put_live_block(&self, tenant: &TenantId, meta: BlockMeta) {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.tenants.entry(tenant.clone()).or_default();
        state.objects.insert(
            format!("{}/meta.json", meta.block_id),
            self.now(),
        );
        state.live.insert(meta.block_id, meta);
    }

    pub fn put_compacted_block(&self, tenant: &TenantId, meta: CompactedBlockMeta) {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.tenants.entry(tenant.clone()).or_default();
        state.objects.insert(
            format!("{}/meta.compacted.json", meta.block_id()),
            self.now(),
        );
        state.compacted.insert(meta.block_id(), meta);
    }

    pub fn set_no_compact(&self, tenant: &TenantId, block: BlockId) {
        let mut inner = self.inner.lock().unwrap();
        inner.tenants.entry(tenant.clone()).or_default().no_compact.insert(block);
    }

    pub fn remove_block(&self, tenant: &TenantId, block: BlockId) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.tenants.get_mut(tenant) {
            state.live.remove(&block);
            state.compacted.remove(&block);
            state.objects.remove(&format!("{}/meta.json", block));
            state.objects.remove(&format!("{}/meta.compacted.json", block));
        }
    }

    pub fn put_object(&self, tenant: &TenantId, key: impl Into<String>, modified_unix_secs: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tenants
            .entry(tenant.clone())
            .or_default()
            .objects
            .insert(key.into(), modified_unix_secs);
    }

    pub fn has_tenant_index(&self, tenant: &TenantId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .tenants
            .get(tenant)
            .map(|s| s.index.is_some())
            .unwrap_or(false)
    }

    pub fn forget_tenant(&self, tenant: &TenantId) {
        self.inner.lock().unwrap().tenants.remove(tenant);
    }

    /// Test-only hook that bypasses `write_tenant_index` to plant an index
    /// verbatim, including one carrying an unsupported schema version.
    pub fn inject_tenant_index(&self, tenant: &TenantId, index: TenantIndex) {
        let mut inner = self.inner.lock().unwrap();
        inner.tenants.entry(tenant.clone()).or_default().index = Some(index);
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn list_tenants(&self, _cancel: &CancellationToken) -> Result<Vec<TenantId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tenants.keys().cloned().collect())
    }

    async fn list_blocks(
        &self,
        tenant: &TenantId,
        _cancel: &CancellationToken,
    ) -> Result<BlockListing, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(state) = inner.tenants.get(tenant) else {
            return Ok(BlockListing::default());
        };
        Ok(BlockListing {
            live_ids: state.live.keys().copied().collect(),
            compacted_ids: state.compacted.keys().copied().collect(),
        })
    }

    async fn read_block_meta(
        &self,
        tenant: &TenantId,
        block: BlockId,
        _cancel: &CancellationToken,
    ) -> Result<BlockMeta, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .tenants
            .get(tenant)
            .and_then(|s| s.live.get(&block))
            .cloned()
            .ok_or(StoreError::DoesNotExist)
    }

    async fn read_compacted_block_meta(
        &self,
        tenant: &TenantId,
        block: BlockId,
        _cancel: &CancellationToken,
    ) -> Result<CompactedBlockMeta, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .tenants
            .get(tenant)
            .and_then(|s| s.compacted.get(&block))
            .cloned()
            .ok_or(StoreError::DoesNotExist)
    }

    async fn read_tenant_index(
        &self,
        tenant: &TenantId,
        _cancel: &CancellationToken,
    ) -> Result<TenantIndex, StoreError> {
        let index = {
            let inner = self.inner.lock().unwrap();
            inner
                .tenants
                .get(tenant)
                .and_then(|s| s.index.clone())
                .ok_or(StoreError::DoesNotExist)?
        };
        index.check_version()?;
        Ok(index)
    }

    async fn write_tenant_index(
        &self,
        tenant: &TenantId,
        metas: &[BlockMeta],
        compacted_metas: &[CompactedBlockMeta],
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let now = self.now();
        let mut inner = self.inner.lock().unwrap();
        let state = inner.tenants.entry(tenant.clone()).or_default();
        let created_at = state
            .index
            .as_ref()
            .map(|idx| idx.created_at + 1)
            .unwrap_or(now)
            .max(now);
        state.index = Some(TenantIndex::new(
            created_at,
            metas.to_vec(),
            compacted_metas.to_vec(),
        ));
        Ok(())
    }

    async fn has_no_compact_flag(
        &self,
        tenant: &TenantId,
        block: BlockId,
        _cancel: &CancellationToken,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tenants
            .get(tenant)
            .map(|s| s.no_compact.contains(&block))
            .unwrap_or(false))
    }

    async fn find(
        &self,
        tenant: &TenantId,
        prefix: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ObjectListing>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(state) = inner.tenants.get(tenant) else {
            return Ok(Vec::new());
        };
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, modified)| ObjectListing {
                key: key.clone(),
                modified_unix_secs: *modified,
            })
            .collect())
    }

    async fn delete(
        &self,
        tenant: &TenantId,
        key: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.tenants.get_mut(tenant) {
            state.objects.remove(key);
        }
        Ok(())
    }
}
