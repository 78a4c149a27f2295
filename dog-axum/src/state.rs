use std::collections::HashMap;
use std::sync::Arc;

use dog_auth::TokenAuthenticationGate;
use dog_core::errors::DogError;
use dog_core::{SecurityContext, TenantId};
use dog_demux::{ApiChannel, MultitenantDemux};

use crate::DogAxumError;

/// Shared per-app state: the gate plus one demux per backend service.
#[derive(Clone)]
pub struct DogAxumState {
    pub gate: Arc<TokenAuthenticationGate>,
    demuxes: Arc<HashMap<String, Arc<MultitenantDemux>>>,
}

impl DogAxumState {
    pub fn new(gate: TokenAuthenticationGate) -> Self {
        Self {
            gate: Arc::new(gate),
            demuxes: Arc::new(HashMap::new()),
        }
    }

    pub(crate) fn add_demux(&mut self, demux: MultitenantDemux) {
        Arc::make_mut(&mut self.demuxes).insert(demux.service().to_string(), Arc::new(demux));
    }

    pub fn demux(&self, service: &str) -> Option<&Arc<MultitenantDemux>> {
        self.demuxes.get(service)
    }

    /// Wait, up to the demux's configured timeout, for a ready channel to
    /// `service` for `tenant`.
    pub async fn channel(
        &self,
        ctx: &mut SecurityContext,
        service: &str,
        tenant: &TenantId,
    ) -> Result<Arc<dyn ApiChannel>, DogAxumError> {
        let demux = self
            .demux(service)
            .ok_or_else(|| DogError::general_error(format!("No demux registered for service '{}'", service)))?;
        let timeout = demux.config().timeout;
        Ok(demux.await_channel(ctx, tenant, timeout).await?)
    }
}
