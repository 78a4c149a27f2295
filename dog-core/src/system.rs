use std::sync::Arc;

use crate::principal::{Authority, Principal};
use crate::tenant::TenantScope;

pub const SYSTEM_IDENTITY: &str = "system";
pub const SYSTEM_AUTHORITY: &str = "ROLE_SYSTEM";

/// Supplies the privileged principal used for tenant lookups and channel
/// readiness probes.
pub trait SystemIdentityProvider: Send + Sync {
    /// Platform-wide system principal (no tenant scope).
    fn system_principal(&self) -> Arc<Principal>;

    /// System principal scoped to a single tenant.
    fn system_principal_for_tenant(&self, tenant: &TenantScope) -> Arc<Principal>;
}

/// A fixed system identity with a configurable authority set.
#[derive(Debug, Clone)]
pub struct StaticSystemIdentity {
    identity: String,
    authorities: Vec<Authority>,
    platform: Arc<Principal>,
}

impl StaticSystemIdentity {
    pub fn new<S, I, A>(identity: S, authorities: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<Authority>,
    {
        let identity = identity.into();
        let authorities: Vec<Authority> = authorities.into_iter().map(Into::into).collect();
        let platform = Arc::new(Principal::system(identity.clone(), authorities.clone()));
        Self {
            identity,
            authorities,
            platform,
        }
    }
}

impl Default for StaticSystemIdentity {
    fn default() -> Self {
        Self::new(SYSTEM_IDENTITY, [SYSTEM_AUTHORITY])
    }
}

impl SystemIdentityProvider for StaticSystemIdentity {
    fn system_principal(&self) -> Arc<Principal> {
        Arc::clone(&self.platform)
    }

    fn system_principal_for_tenant(&self, tenant: &TenantScope) -> Arc<Principal> {
        Arc::new(Principal::system_for_tenant(
            self.identity.clone(),
            self.authorities.clone(),
            tenant.clone(),
        ))
    }
}
