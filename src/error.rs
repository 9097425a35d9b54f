//! Crate-wide error types. Library surface returns `thiserror` enums;
//! `anyhow` stays out of the public API (it shows up only in tests).

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by a single cycle ([`crate::orchestrator::run_cycle`]).
///
/// The policy is to recover locally whenever a previous snapshot exists,
/// and to surface an error only when cycle-level integrity is lost.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The cycle's cancellation handle fired before all tenants finished.
    /// No snapshot is published; in-flight tenant tasks were allowed to run
    /// to completion against a background context first.
    #[error("cycle cancelled")]
    Cancelled,

    /// More tenants failed persistently than `tolerate_tenant_failures`
    /// allows. The partially-assembled snapshot is discarded.
    #[error("too many tenant failures: budget exhausted")]
    TooManyTenantFailures,

    /// `list_tenants` itself failed; there is nothing to iterate.
    #[error("failed to list tenants: {0}")]
    ListTenants(#[source] StoreError),
}

/// Errors surfaced by the empty-tenant reaper ([`crate::reaper`]).
#[derive(Debug, Error)]
pub enum ReaperError {
    /// `empty_tenant_deletion_age` was zero while deletion was enabled;
    /// this is a configuration error, not a transient one, and is not
    /// retried.
    #[error("empty_tenant_deletion_age must be non-zero when empty_tenant_deletion_enabled is set")]
    ZeroDeletionAge,

    #[error("failed to walk tenant key subtree: {0}")]
    Find(#[source] StoreError),

    #[error("failed to delete stale object: {0}")]
    Delete(#[source] StoreError),
}

/// Errors surfaced while polling a single tenant
/// ([`crate::tenant_poller::poll_tenant`]), before retry is applied.
#[derive(Debug, Error)]
pub enum TenantPollError {
    #[error("tenant index pull failed: {0}")]
    IndexPull(#[source] StoreError),

    #[error("pulled tenant index is stale")]
    StaleIndex,

    #[error("failed to list blocks: {0}")]
    ListBlocks(#[source] StoreError),

    #[error("failed to resolve unknown blocks: {0}")]
    Resolve(#[source] StoreError),
}
