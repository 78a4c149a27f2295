// Tenant directory contract and in-process implementations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use dog_core::{SecurityContext, TenantId, TenantRecord};
use parking_lot::RwLock;
use tracing::debug;

/// Read access to tenant records.
///
/// `ctx` is the context the lookup runs under. Callers elevate to the system
/// identity first, so implementations may refuse reads from anything else.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_by_token(&self, ctx: &SecurityContext, tenant_id: &TenantId) -> Result<Option<TenantRecord>>;
}

/// HashMap-backed directory for embedding and tests.
#[derive(Default)]
pub struct MemoryTenantDirectory {
    tenants: RwLock<HashMap<TenantId, TenantRecord>>,
    require_system: bool,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject lookups not made under a system principal.
    pub fn require_system(mut self) -> Self {
        self.require_system = true;
        self
    }

    pub fn with_tenant(self, record: TenantRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: TenantRecord) {
        self.tenants.write().insert(record.tenant_id.clone(), record);
    }

    pub fn remove(&self, tenant_id: &TenantId) -> Option<TenantRecord> {
        self.tenants.write().remove(tenant_id)
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn get_by_token(&self, ctx: &SecurityContext, tenant_id: &TenantId) -> Result<Option<TenantRecord>> {
        if self.require_system && !ctx.principal().is_some_and(|p| p.is_system()) {
            anyhow::bail!("tenant directory read requires the system identity");
        }
        Ok(self.tenants.read().get(tenant_id).cloned())
    }
}

struct CacheEntry {
    loaded_at: Instant,
    record: TenantRecord,
}

/// TTL cache in front of another directory. Misses are not cached, so a
/// newly provisioned tenant becomes visible on the next request.
pub struct CachedTenantDirectory {
    inner: Arc<dyn TenantDirectory>,
    ttl: Duration,
    entries: RwLock<HashMap<TenantId, CacheEntry>>,
}

impl CachedTenantDirectory {
    pub fn new(inner: Arc<dyn TenantDirectory>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn invalidate(&self, tenant_id: &TenantId) {
        self.entries.write().remove(tenant_id);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn cached(&self, tenant_id: &TenantId) -> Option<TenantRecord> {
        let entries = self.entries.read();
        let entry = entries.get(tenant_id)?;
        (entry.loaded_at.elapsed() < self.ttl).then(|| entry.record.clone())
    }
}

#[async_trait]
impl TenantDirectory for CachedTenantDirectory {
    async fn get_by_token(&self, ctx: &SecurityContext, tenant_id: &TenantId) -> Result<Option<TenantRecord>> {
        if let Some(record) = self.cached(tenant_id) {
            debug!(tenant_id = %tenant_id, "tenant cache hit");
            return Ok(Some(record));
        }

        let loaded = self.inner.get_by_token(ctx, tenant_id).await?;
        match &loaded {
            Some(record) => {
                self.entries.write().insert(
                    tenant_id.clone(),
                    CacheEntry {
                        loaded_at: Instant::now(),
                        record: record.clone(),
                    },
                );
            }
            None => {
                self.entries.write().remove(tenant_id);
            }
        }
        Ok(loaded)
    }
}
