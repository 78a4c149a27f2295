// Backend channel contract.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use dog_core::{SecurityContext, TenantId};

/// What a channel is connected to.
///
/// A channel without a tenant is shared: it serves every tenant and decides
/// per-tenant readiness from the context it is probed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelBinding {
    pub service: String,
    pub tenant: Option<TenantId>,
}

impl ChannelBinding {
    pub fn shared(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            tenant: None,
        }
    }

    pub fn tenant(service: impl Into<String>, tenant: impl Into<TenantId>) -> Self {
        Self {
            service: service.into(),
            tenant: Some(tenant.into()),
        }
    }

    /// Binding half of the channel match predicate.
    pub fn serves(&self, service: &str, tenant: &TenantId) -> bool {
        self.service == service && self.tenant.as_ref().map_or(true, |t| t == tenant)
    }
}

impl fmt::Display for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(t) => write!(f, "{}[{}]", self.service, t),
            None => write!(f, "{}[*]", self.service),
        }
    }
}

/// A connection to a backend processing path.
///
/// Channels are created and torn down by infrastructure; the demux only
/// reads their binding and probes availability.
pub trait ApiChannel: Send + Sync {
    fn binding(&self) -> &ChannelBinding;

    /// Cheap readiness probe. `ctx` carries the system principal scoped to
    /// the tenant being waited for.
    fn is_available(&self, ctx: &SecurityContext) -> bool;
}

impl fmt::Debug for dyn ApiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiChannel").field(self.binding()).finish()
    }
}

/// Channel whose readiness is flipped by its owner, e.g. from a connection
/// state callback.
#[derive(Debug)]
pub struct ToggleChannel {
    binding: ChannelBinding,
    available: AtomicBool,
}

impl ToggleChannel {
    pub fn new(binding: ChannelBinding) -> Self {
        Self {
            binding,
            available: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl ApiChannel for ToggleChannel {
    fn binding(&self) -> &ChannelBinding {
        &self.binding
    }

    fn is_available(&self, _ctx: &SecurityContext) -> bool {
        self.available.load(Ordering::Acquire)
    }
}
