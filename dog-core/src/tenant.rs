//! Core multi-tenant types for DogRS.

use std::collections::BTreeMap;
use std::fmt;

/// A tenant identifier (the tenant "token" carried in request headers).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The tenant a principal is authorized to act within.
///
/// Carries only the reference data downstream code needs; the tenant's
/// authentication secret never leaves the [`TenantRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TenantScope {
    pub tenant_id: TenantId,
    pub name: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl TenantScope {
    /// Convenience constructor from a string.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            name: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

/// A tenant as stored by the tenant directory.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TenantRecord {
    pub tenant_id: TenantId,
    pub auth_secret: String,
    pub name: Option<String>,
    pub status: TenantStatus,
    pub metadata: BTreeMap<String, String>,
}

impl TenantRecord {
    pub fn new(tenant_id: impl Into<TenantId>, auth_secret: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            auth_secret: auth_secret.into(),
            name: None,
            status: TenantStatus::Active,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// The scope attached to principals admitted into this tenant.
    pub fn scope(&self) -> TenantScope {
        TenantScope {
            tenant_id: self.tenant_id.clone(),
            name: self.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for TenantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantRecord")
            .field("tenant_id", &self.tenant_id)
            .field("auth_secret", &"<redacted>")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("metadata", &self.metadata)
            .finish()
    }
}
