// Tenant resolution under the system identity.

use std::sync::Arc;

use dog_core::{AdmissionError, Principal, SecurityContext, SystemIdentityProvider, TenantId, TenantRecord};
use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

use crate::directory::TenantDirectory;

/// Validates a tenant credential pair and attaches the tenant scope to a
/// principal.
#[derive(Clone)]
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    system: Arc<dyn SystemIdentityProvider>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, system: Arc<dyn SystemIdentityProvider>) -> Self {
        Self { directory, system }
    }

    pub fn system_identity(&self) -> &Arc<dyn SystemIdentityProvider> {
        &self.system
    }

    /// Look up `tenant_id`, check `secret` against it and attach the tenant
    /// scope to `principal`.
    ///
    /// The lookup runs with the system principal active on `ctx`; whatever
    /// was active before is back in place when this returns, on every path.
    #[instrument(skip(self, ctx, principal, tenant_id, secret), fields(tenant_id = %tenant_id, identity = %principal.identity()))]
    pub async fn resolve_tenant(
        &self,
        ctx: &mut SecurityContext,
        principal: &mut Principal,
        tenant_id: &TenantId,
        secret: &str,
    ) -> Result<(), AdmissionError> {
        let record = self.lookup(ctx, tenant_id).await?;

        if !record.is_active() {
            debug!("Tenant {} is {:?}", tenant_id, record.status);
            return Err(AdmissionError::TenantUnavailable(tenant_id.clone()));
        }

        if !secrets_match(&record, secret) {
            debug!("Tenant auth mismatch for {}", tenant_id);
            return Err(AdmissionError::TenantAuthMismatch(tenant_id.clone()));
        }

        principal.attach_tenant(record.scope())?;
        debug!("Attached tenant {} to {}", tenant_id, principal.identity());
        Ok(())
    }

    async fn lookup(&self, ctx: &mut SecurityContext, tenant_id: &TenantId) -> Result<TenantRecord, AdmissionError> {
        let elevated = ctx.elevate(self.system.system_principal());
        let found = self
            .directory
            .get_by_token(&elevated, tenant_id)
            .await
            .map_err(AdmissionError::Unexpected)?;
        drop(elevated);

        found.ok_or_else(|| {
            debug!("Tenant {} not found", tenant_id);
            AdmissionError::UnknownTenant(tenant_id.clone())
        })
    }
}

fn secrets_match(record: &TenantRecord, presented: &str) -> bool {
    record.auth_secret.as_bytes().ct_eq(presented.as_bytes()).into()
}
