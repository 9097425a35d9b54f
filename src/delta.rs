//! Computes which block ids a tenant's current listing already has metadata
//! for (carried forward with zero re-reads) versus which are unknown and
//! need a metadata fetch.
//!
//! This is the poller's key optimisation: a steady-state cycle, where the
//! store's listing hasn't changed, does zero per-block reads.

use std::collections::HashMap;

use crate::ids::BlockId;
use crate::meta::{BlockMeta, CompactedBlockMeta};
use crate::store::BlockListing;

/// The outcome of comparing a tenant's previous metas against its current
/// listing.
#[derive(Debug, Default)]
pub struct Delta {
    /// Previously-known live metas whose block id is still listed live.
    pub known_live: Vec<BlockMeta>,
    /// Previously-known compacted metas whose block id is still listed
    /// compacted.
    pub known_compacted: Vec<CompactedBlockMeta>,
    /// Ids in the current listing that matched nothing in `previous`,
    /// mapped to whether the store listed them as compacted.
    pub unknown: HashMap<BlockId, bool>,
}

/// Compares `previous_metas`/`previous_compacted` against `current`.
pub fn compute(
    previous_metas: &[BlockMeta],
    previous_compacted: &[CompactedBlockMeta],
    current: &BlockListing,
) -> Delta {
    let live_by_id: HashMap<BlockId, &BlockMeta> =
        previous_metas.iter().map(|m| (m.block_id, m)).collect();
    let compacted_by_id: HashMap<BlockId, &CompactedBlockMeta> = previous_compacted
        .iter()
        .map(|m| (m.block_id(), m))
        .collect();

    let mut delta = Delta::default();

    for &id in &current.live_ids {
        match live_by_id.get(&id) {
            Some(meta) => delta.known_live.push((*meta).clone()),
            None => {
                delta.unknown.insert(id, false);
            }
        }
    }

    for &id in &current.compacted_ids {
        match compacted_by_id.get(&id) {
            Some(meta) => delta.known_compacted.push((*meta).clone()),
            // A block the store now lists as compacted always resolves via
            // the compacted-meta path, even if it happened to be unknown
            // from the live pass above (the two listings should be
            // disjoint, but compacted status wins if they aren't).
            None => {
                delta.unknown.insert(id, true);
            }
        }
    }

    delta
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
    fn steady_state_yields_no_unknowns() {
        let a = meta(BlockId::generate());
        let b = meta(BlockId::generate());
        let listing = BlockListing {
            live_ids: vec![a.block_id, b.block_id],
            compacted_ids: vec![],
        };
        let delta = compute(&[a.clone(), b.clone()], &[], &listing);
        assert_eq!(delta.known_live.len(), 2);
        assert!(delta.unknown.is_empty());
    }

    #[test]
    fn new_block_is_unknown_not_compacted() {
        let known = meta(BlockId::generate());
        let new_id = BlockId::generate();
        let listing = BlockListing {
            live_ids: vec![known.block_id, new_id],
            compacted_ids: vec![],
        };
        let delta = compute(&[known], &[], &listing);
        assert_eq!(delta.known_live.len(), 1);
        assert_eq!(delta.unknown.get(&new_id), Some(&false));
    }

    #[test]
    fn newly_compacted_block_is_unknown_compacted() {
        let listing = BlockListing {
            live_ids: vec![],
            compacted_ids: vec![BlockId::generate()],
        };
        let delta = compute(&[], &[], &listing);
        assert_eq!(delta.unknown.len(), 1);
        assert_eq!(delta.unknown.values().next(), Some(&true));
    }
}
