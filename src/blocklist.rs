//! The process-wide, thread-safe view of per-tenant block lists consumed by
//! readers.
//!
//! Writers never mutate an already-published snapshot; each cycle builds a
//! new one and swaps it in atomically. Readers that grabbed a handle before
//! the swap keep observing the old snapshot for as long as they hold it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ids::TenantId;
use crate::meta::{BlockMeta, CompactedBlockMeta};

/// Per-tenant live block metas.
pub type PerTenant = HashMap<TenantId, Vec<BlockMeta>>;
/// Per-tenant compacted block metas.
pub type PerTenantCompacted = HashMap<TenantId, Vec<CompactedBlockMeta>>;

/// An immutable, point-in-time view of every tenant's block lists.
#[derive(Debug, Default)]
pub struct Snapshot {
    metas: PerTenant,
    compacted_metas: PerTenantCompacted,
}

impl Snapshot {
    pub fn metas(&self, tenant: &TenantId) -> &[BlockMeta] {
        self.metas.get(tenant).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn compacted_metas(&self, tenant: &TenantId) -> &[CompactedBlockMeta] {
        self.compacted_metas
            .get(tenant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.metas.keys()
    }
}

/// A process-wide, atomically-swapped snapshot of per-tenant block lists.
pub struct BlocklistState {
    current: RwLock<Arc<Snapshot>>,
}

impl BlocklistState {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Returns a stable handle to the currently-published snapshot. The
    /// handle is unaffected by a subsequent `apply`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap())
    }

    pub fn metas(&self, tenant: &TenantId) -> Vec<BlockMeta> {
        self.snapshot().metas(tenant).to_vec()
    }

    pub fn compacted_metas(&self, tenant: &TenantId) -> Vec<CompactedBlockMeta> {
        self.snapshot().compacted_metas(tenant).to_vec()
    }

    /// Atomically replaces the whole published snapshot.
    pub fn apply(&self, metas: PerTenant, compacted_metas: PerTenantCompacted) {
        let next = Arc::new(Snapshot {
            metas,
            compacted_metas,
        });
        *self.current.write().unwrap() = next;
    }
}

impl Default for BlocklistState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::BlockId;

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

    #[test]
    fn apply_replaces_whole_snapshot_atomically() {
        let state = BlocklistState::new();
        let t1 = TenantId::new("t1").unwrap();
        let a = meta(BlockId::generate());

        let mut metas = PerTenant::new();
        metas.insert(t1.clone(), vec![a.clone()]);
        state.apply(metas, PerTenantCompacted::new());
        assert_eq!(state.metas(&t1), vec![a]);

        let held = state.snapshot();

        let b = meta(BlockId::generate());
        let mut metas2 = PerTenant::new();
        metas2.insert(t1.clone(), vec![b.clone()]);
        state.apply(metas2, PerTenantCompacted::new());

        // A reader holding the old snapshot never observes a partial merge.
        assert_eq!(held.metas(&t1), vec![a]);
        assert_eq!(state.metas(&t1), vec![b]);
    }

    #[test]
    fn unknown_tenant_yields_empty_slice() {
        let state = BlocklistState::new();
        let unknown = TenantId::new("ghost").unwrap();
        assert!(state.metas(&unknown).is_empty());
        assert!(state.compacted_metas(&unknown).is_empty());
    }
}
