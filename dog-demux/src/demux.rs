// Multitenant demultiplexer.
//
// Picks the channel that should carry a call for a tenant, waiting with
// capped exponential backoff until one reports ready. Every probe runs with
// the tenant-scoped system principal active on the caller's context.

use std::sync::Arc;
use std::time::Duration;

use dog_core::{AdmissionError, Principal, SecurityContext, SystemIdentityProvider, TenantId, TenantScope};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::ApiChannel;
use crate::config::DemuxConfig;
use crate::registry::ChannelRegistry;

/// States of a readiness wait.
#[derive(Debug)]
pub enum WaitState {
    Probing { attempt: u32, next_delay: Duration },
    Found(Arc<dyn ApiChannel>),
    TimedOut,
    Cancelled,
}

/// Demultiplexer for one logical service.
pub struct MultitenantDemux {
    service: String,
    registry: Arc<ChannelRegistry>,
    system: Arc<dyn SystemIdentityProvider>,
    config: DemuxConfig,
}

impl MultitenantDemux {
    pub fn new(
        service: impl Into<String>,
        registry: Arc<ChannelRegistry>,
        system: Arc<dyn SystemIdentityProvider>,
    ) -> Self {
        Self {
            service: service.into(),
            registry,
            system,
            config: DemuxConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DemuxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// One probe, no waiting.
    pub fn try_channel(&self, ctx: &mut SecurityContext, tenant: &TenantId) -> Option<Arc<dyn ApiChannel>> {
        let system = self.system_for(ctx, tenant);
        let elevated = ctx.elevate(system);
        self.registry.select(&elevated, &self.service, tenant)
    }

    /// Wait up to `timeout` for a channel serving `tenant` to become ready.
    pub async fn await_channel(
        &self,
        ctx: &mut SecurityContext,
        tenant: &TenantId,
        timeout: Duration,
    ) -> Result<Arc<dyn ApiChannel>, AdmissionError> {
        self.wait(ctx, tenant, timeout, None).await
    }

    /// [`await_channel`](Self::await_channel) that also gives up as soon as
    /// `cancel` fires.
    pub async fn await_channel_cancellable(
        &self,
        ctx: &mut SecurityContext,
        tenant: &TenantId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn ApiChannel>, AdmissionError> {
        self.wait(ctx, tenant, timeout, Some(cancel)).await
    }

    /// System principal scoped to `tenant`. The caller's own scope is reused
    /// when it names the same tenant, so probes see its name and metadata.
    fn system_for(&self, ctx: &SecurityContext, tenant: &TenantId) -> Arc<Principal> {
        let scope = ctx
            .principal()
            .and_then(|p| p.tenant())
            .filter(|scope| &scope.tenant_id == tenant)
            .cloned()
            .unwrap_or_else(|| TenantScope::new(tenant.as_str()));
        self.system.system_principal_for_tenant(&scope)
    }

    #[instrument(skip(self, ctx, tenant, cancel), fields(service = %self.service, tenant_id = %tenant))]
    async fn wait(
        &self,
        ctx: &mut SecurityContext,
        tenant: &TenantId,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Arc<dyn ApiChannel>, AdmissionError> {
        let system = self.system_for(ctx, tenant);
        let elevated = ctx.elevate(system);
        let started = Instant::now();
        let deadline = started + timeout;

        let mut state = WaitState::Probing {
            attempt: 0,
            next_delay: self.config.initial_poll,
        };

        loop {
            state = match state {
                WaitState::Probing { attempt, next_delay } => {
                    let found = self.registry.select(&elevated, &self.service, tenant);
                    let now = Instant::now();
                    if let Some(channel) = found {
                        WaitState::Found(channel)
                    } else if now >= deadline {
                        WaitState::TimedOut
                    } else {
                        // The last pause ends on the deadline, where one final probe runs.
                        let pause = next_delay.min(deadline - now);
                        debug!("No channel ready (attempt {}), retrying in {:?}", attempt, pause);
                        let cancelled = match cancel {
                            Some(token) => tokio::select! {
                                _ = token.cancelled() => true,
                                _ = sleep(pause) => false,
                            },
                            None => {
                                sleep(pause).await;
                                false
                            }
                        };
                        if cancelled {
                            WaitState::Cancelled
                        } else {
                            WaitState::Probing {
                                attempt: attempt + 1,
                                next_delay: self.config.next_delay(next_delay),
                            }
                        }
                    }
                }
                WaitState::Found(channel) => {
                    let waited = started.elapsed();
                    if waited.is_zero() {
                        debug!("Channel {} ready", channel.binding());
                    } else {
                        info!("Channel {} ready after {:?}", channel.binding(), waited);
                    }
                    return Ok(channel);
                }
                WaitState::TimedOut => {
                    let waited = started.elapsed();
                    warn!("Tenant engine not available after {:?}", waited);
                    return Err(AdmissionError::ChannelUnavailable {
                        service: self.service.clone(),
                        tenant: tenant.clone(),
                        waited_ms: waited.as_millis(),
                    });
                }
                WaitState::Cancelled => {
                    debug!("Wait cancelled after {:?}", started.elapsed());
                    return Err(AdmissionError::WaitCancelled(tenant.clone()));
                }
            };
        }
    }
}
