// Channel registry and selector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dog_core::{SecurityContext, TenantId};
use parking_lot::RwLock;
use tracing::debug;

use crate::channel::ApiChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

/// Channels in registration order.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<Vec<(ChannelId, Arc<dyn ApiChannel>)>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel: Arc<dyn ApiChannel>) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registered channel {} for {}", id.0, channel.binding());
        self.channels.write().push((id, channel));
        id
    }

    pub fn unregister(&self, id: ChannelId) -> Option<Arc<dyn ApiChannel>> {
        let mut channels = self.channels.write();
        let pos = channels.iter().position(|(cid, _)| *cid == id)?;
        let (_, channel) = channels.remove(pos);
        debug!("Unregistered channel {} for {}", id.0, channel.binding());
        Some(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Channels whose binding serves `service` for `tenant`, in
    /// registration order, available or not.
    pub fn candidates(&self, service: &str, tenant: &TenantId) -> Vec<Arc<dyn ApiChannel>> {
        self.channels
            .read()
            .iter()
            .filter(|(_, c)| c.binding().serves(service, tenant))
            .map(|(_, c)| Arc::clone(c))
            .collect()
    }

    /// First-registered channel that matches: bound to `service` and
    /// `tenant` and available under `ctx`.
    pub fn select(&self, ctx: &SecurityContext, service: &str, tenant: &TenantId) -> Option<Arc<dyn ApiChannel>> {
        // Probes run outside the lock; channels may be slow to answer.
        self.candidates(service, tenant)
            .into_iter()
            .find(|c| is_channel_match(c.as_ref(), ctx, service, tenant))
    }
}

/// The channel match predicate.
pub fn is_channel_match(channel: &dyn ApiChannel, ctx: &SecurityContext, service: &str, tenant: &TenantId) -> bool {
    channel.binding().serves(service, tenant) && channel.is_available(ctx)
}
