//! Identifiers used throughout the poller: opaque tenant names and
//! content-addressed block ids.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 128-bit universally-unique block identifier.
///
/// Total order is irrelevant; only equality and hashing are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub uuid::Uuid);

impl BlockId {
    pub fn new(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An opaque, non-empty tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

/// Returned by [`TenantId::new`] when given an empty string.
#[derive(Debug, thiserror::Error)]
#[error("tenant id must not be empty")]
pub struct EmptyTenantId;

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyTenantId> {
        let id = id.into();
        if id.is_empty() {
            return Err(EmptyTenantId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = EmptyTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for TenantId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_tenant_id() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("t1").is_ok());
    }

    #[test]
    fn block_id_equality_ignores_order() {
        let a = BlockId::generate();
        let b = BlockId::generate();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
