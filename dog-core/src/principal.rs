//! Authenticated identities.
//!
//! A [`Principal`] is what the gate produces from a verified bearer token:
//! an identity, the authorities granted to it, and at most one
//! [`TenantScope`]. Tenant awareness is an explicit optional field rather
//! than a separate type, so every consumer handles both platform-level and
//! tenant-scoped callers through the same value.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::tenant::{TenantId, TenantScope};

/// A single granted authority (role or permission name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Authority(pub String);

impl Authority {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Authority {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Authority {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a principal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrincipalKind {
    /// Caller authenticated from an inbound bearer token.
    User,
    /// Platform identity used for privileged lookups and probes.
    System,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("principal '{identity}' is already scoped to tenant '{existing}'")]
    ScopeAlreadyAttached { identity: String, existing: TenantId },
}

/// The authenticated identity associated with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Principal {
    identity: String,
    kind: PrincipalKind,
    authorities: BTreeSet<Authority>,
    tenant: Option<TenantScope>,
}

impl Principal {
    /// A user principal built from verified token claims.
    pub fn user<S, I, A>(identity: S, authorities: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<Authority>,
    {
        Self {
            identity: identity.into(),
            kind: PrincipalKind::User,
            authorities: authorities.into_iter().map(Into::into).collect(),
            tenant: None,
        }
    }

    pub fn system<S, I, A>(identity: S, authorities: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<Authority>,
    {
        Self {
            identity: identity.into(),
            kind: PrincipalKind::System,
            authorities: authorities.into_iter().map(Into::into).collect(),
            tenant: None,
        }
    }

    /// A system principal confined to one tenant.
    pub fn system_for_tenant<S, I, A>(identity: S, authorities: I, scope: TenantScope) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<Authority>,
    {
        Self {
            tenant: Some(scope),
            ..Self::system(identity, authorities)
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn is_system(&self) -> bool {
        self.kind == PrincipalKind::System
    }

    pub fn authorities(&self) -> &BTreeSet<Authority> {
        &self.authorities
    }

    pub fn has_authority(&self, name: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == name)
    }

    pub fn tenant(&self) -> Option<&TenantScope> {
        self.tenant.as_ref()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant.as_ref().map(|t| &t.tenant_id)
    }

    /// Attach the tenant this principal may act within.
    ///
    /// Single assignment: once a scope is set it is never replaced, and a
    /// second call fails with [`ScopeError::ScopeAlreadyAttached`].
    pub fn attach_tenant(&mut self, scope: TenantScope) -> Result<(), ScopeError> {
        if let Some(existing) = &self.tenant {
            return Err(ScopeError::ScopeAlreadyAttached {
                identity: self.identity.clone(),
                existing: existing.tenant_id.clone(),
            });
        }
        self.tenant = Some(scope);
        Ok(())
    }

    /// Builder form of [`Principal::attach_tenant`] for freshly built values.
    pub fn with_tenant(mut self, scope: TenantScope) -> Result<Self, ScopeError> {
        self.attach_tenant(scope)?;
        Ok(self)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(scope) => write!(f, "{}@{}", self.identity, scope.tenant_id),
            None => f.write_str(&self.identity),
        }
    }
}
