//! The block metadata types produced by the writer/compactor and persisted
//! by the poller as a per-tenant snapshot.

use serde::{Deserialize, Serialize};

use crate::ids::BlockId;

/// Metadata describing a live, immutable block.
///
/// Produced by the writer at block creation and never mutated thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub block_id: BlockId,
    pub start_time: i64,
    pub end_time: i64,
    pub total_objects: u64,
    pub size_bytes: u64,
    pub encoding: String,
    pub data_encoding: String,
    pub bloom_shard_count: u32,
    pub index_page_size: u32,
    pub total_records: u64,
    pub dedicated_columns: Vec<String>,
}

/// A [`BlockMeta`] plus the time its input block was retired by compaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactedBlockMeta {
    pub meta: BlockMeta,
    pub compacted_at: i64,
}

impl CompactedBlockMeta {
    pub fn block_id(&self) -> BlockId {
        self.meta.block_id
    }
}

/// On-disk schema version of [`TenantIndex`]. Bumped whenever a
/// backwards-incompatible change is made to the serialised shape.
pub const TENANT_INDEX_VERSION: u32 = 1;

/// A point-in-time snapshot of one tenant's live and compacted block metas,
/// persisted atomically at a well-known key and readable by any instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantIndex {
    /// Explicit schema version, checked on read so the format can evolve
    /// without depending on the producing process's binary version.
    pub version: u32,
    pub created_at: i64,
    pub metas: Vec<BlockMeta>,
    pub compacted_metas: Vec<CompactedBlockMeta>,
}

impl TenantIndex {
    pub fn new(created_at: i64, metas: Vec<BlockMeta>, compacted_metas: Vec<CompactedBlockMeta>) -> Self {
        Self {
            version: TENANT_INDEX_VERSION,
            created_at,
            metas,
            compacted_metas,
        }
    }

    /// Checks this index's schema version against the version this build
    /// knows how to interpret. A store driver should call this right after
    /// deserializing a raw tenant index object so a write from an
    /// incompatible future (or stale past) schema surfaces as a hard error
    /// instead of being silently misread.
    pub fn check_version(&self) -> Result<(), UnsupportedTenantIndexVersion> {
        if self.version != TENANT_INDEX_VERSION {
            return Err(UnsupportedTenantIndexVersion {
                found: self.version,
                expected: TENANT_INDEX_VERSION,
            });
        }
        Ok(())
    }
}

/// Returned by [`TenantIndex::check_version`] when a read tenant index
/// carries a schema version this build does not know how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported tenant index version {found} (expected {expected})")]
pub struct UnsupportedTenantIndexVersion {
    pub found: u32,
    pub expected: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: BlockId) -> BlockMeta {
        BlockMeta {
            block_id: id,
            start_time: 0,
            end_time: 1,
            total_objects: 1,
            size_bytes: 100,
            encoding: "none".into(),
            data_encoding: "v2".into(),
            bloom_shard_count: 1,
            index_page_size: 1024,
            total_records: 10,
            dedicated_columns: vec![],
        }
    }

    #[test]
    fn round_trips_through_json() {
        let idx = TenantIndex::new(5, vec![meta(BlockId::generate())], vec![]);
        let encoded = serde_json::to_string(&idx).unwrap();
        let decoded: TenantIndex = serde_json::from_str(&encoded).unwrap();
        assert_eq!(idx, decoded);
        assert_eq!(decoded.version, TENANT_INDEX_VERSION);
    }
}
