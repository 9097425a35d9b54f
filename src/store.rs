//! The narrow contract the poller requires of an object-store abstraction.
//! The store driver itself — S3/GCS/Azure/filesystem — is out of scope;
//! this module defines only the trait and a trivial in-memory double used
//! by this crate's own tests.

use tokio_util::sync::CancellationToken;

use crate::ids::{BlockId, TenantId};
use crate::meta::{BlockMeta, CompactedBlockMeta, TenantIndex, UnsupportedTenantIndexVersion};

pub mod mem;

/// Errors surfaced verbatim by a [`Store`] implementation, except
/// `DoesNotExist`, which callers match on specifically.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object does not exist")]
    DoesNotExist,

    #[error("store operation cancelled")]
    Cancelled,

    /// A read `TenantIndex` carries a schema version this build cannot
    /// interpret. Surfaced as a hard error rather than a silent truncation,
    /// per the on-disk format's versioning contract.
    #[error(transparent)]
    UnsupportedVersion(#[from] UnsupportedTenantIndexVersion),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, StoreError::DoesNotExist)
    }
}

/// The result of listing one tenant's blocks: ids currently live, and ids
/// currently marked compacted.
#[derive(Debug, Clone, Default)]
pub struct BlockListing {
    pub live_ids: Vec<BlockId>,
    pub compacted_ids: Vec<BlockId>,
}

/// One entry observed while walking a tenant's key subtree.
#[derive(Debug, Clone)]
pub struct ObjectListing {
    pub key: String,
    pub modified_unix_secs: i64,
}

/// Narrow interface onto the object store.
///
/// All operations accept a [`CancellationToken`]; implementations should
/// honor it promptly rather than completing a long-running operation after
/// cancellation is requested.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn list_tenants(&self, cancel: &CancellationToken) -> Result<Vec<TenantId>, StoreError>;

    async fn list_blocks(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<BlockListing, StoreError>;

    async fn read_block_meta(
        &self,
        tenant: &TenantId,
        block: BlockId,
        cancel: &CancellationToken,
    ) -> Result<BlockMeta, StoreError>;

    async fn read_compacted_block_meta(
        &self,
        tenant: &TenantId,
        block: BlockId,
        cancel: &CancellationToken,
    ) -> Result<CompactedBlockMeta, StoreError>;

    /// Reads the tenant index, failing with `DoesNotExist` if none has been
    /// written. Implementations must validate the decoded index's schema
    /// version (`TenantIndex::check_version`) before returning it, so a
    /// reader never silently misinterprets an index from an incompatible
    /// schema.
    async fn read_tenant_index(
        &self,
        tenant: &TenantId,
        cancel: &CancellationToken,
    ) -> Result<TenantIndex, StoreError>;

    async fn write_tenant_index(
        &self,
        tenant: &TenantId,
        metas: &[BlockMeta],
        compacted_metas: &[CompactedBlockMeta],
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    async fn has_no_compact_flag(
        &self,
        tenant: &TenantId,
        block: BlockId,
        cancel: &CancellationToken,
    ) -> Result<bool, StoreError>;

    /// Walks the tenant's key subtree under `prefix`.
    async fn find(
        &self,
        tenant: &TenantId,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectListing>, StoreError>;

    async fn delete(
        &self,
        tenant: &TenantId,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}
