//! The advisory ownership oracle consulted by the tenant poller.
//!
//! The poller treats the sharder as opaque: it may be backed by a
//! consistent-hash ring or anything else that answers the same question
//! cheaply and consistently for this instance. Building or maintaining that
//! ring is out of scope here — analogous to how `journal-client` consumes
//! `gazette::Router` as an opaque routing oracle without owning its
//! topology.

use crate::ids::TenantId;

/// A pure, cheap ownership oracle: does *this* instance own the named job?
pub trait Sharder: Send + Sync + 'static {
    fn owns(&self, job_name: &str) -> bool;
}

/// A [`Sharder`] that always answers the same way. Useful for tests and for
/// single-instance deployments where every instance is a builder.
pub struct Fixed(bool);

impl Fixed {
    pub fn always_builder() -> Self {
        Self(true)
    }

    pub fn never_builder() -> Self {
        Self(false)
    }
}

impl Sharder for Fixed {
    fn owns(&self, _job_name: &str) -> bool {
        self.0
    }
}

/// Probes builder ownership for `tenant` by asking the sharder about each
/// of `builders` advisory slots; a `true` answer for any slot makes this
/// instance a builder for that tenant. `builders == 0` means nobody is ever
/// a builder through this path.
pub fn is_builder(sharder: &dyn Sharder, tenant: &TenantId, builders: usize) -> bool {
    (0..builders).any(|i| sharder.owns(&format!("build-tenant-index-{i}-{tenant}")))
}
