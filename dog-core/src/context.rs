//! Per-request security context.
//!
//! Every in-flight request owns exactly one [`SecurityContext`]; it is passed
//! explicitly to whatever needs to know "who is calling" instead of living in
//! thread-local or global state.
//!
//! Privileged sub-operations swap the active principal through
//! [`SecurityContext::elevate`], which returns an [`ElevationGuard`]. The guard
//! mutably borrows the context, so elevations nest strictly, and its `Drop`
//! puts the previous principal back exactly once: on normal return, on `?`
//! early exit, on panic unwind, and when an async caller is cancelled and its
//! future dropped.
//!
//! ```rust
//! use std::sync::Arc;
//! use dog_core::{Principal, SecurityContext};
//!
//! let mut ctx = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
//! {
//!     let elevated = ctx.elevate(Arc::new(Principal::system("system", ["ROLE_SYSTEM"])));
//!     assert_eq!(elevated.principal().unwrap().identity(), "system");
//! }
//! assert_eq!(ctx.principal().unwrap().identity(), "alice");
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::principal::Principal;
use crate::tenant::TenantId;

#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    active: Option<Arc<Principal>>,
    depth: usize,
}

impl SecurityContext {
    /// An empty (unauthenticated) context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(principal: Principal) -> Self {
        Self {
            active: Some(Arc::new(principal)),
            depth: 0,
        }
    }

    pub fn principal(&self) -> Option<&Arc<Principal>> {
        self.active.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.active.is_some()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.active.as_ref().and_then(|p| p.tenant_id())
    }

    /// Number of elevations currently in effect on this context.
    pub fn elevation_depth(&self) -> usize {
        self.depth
    }

    /// Install the request principal.
    ///
    /// The token gate calls this once per request after a successful
    /// authentication. Request-path code should not call it anywhere else.
    pub fn install(&mut self, principal: Principal) {
        self.active = Some(Arc::new(principal));
    }

    /// Temporarily make `principal` the active identity.
    ///
    /// The previous principal (or absence of one) is restored when the
    /// returned guard is dropped.
    pub fn elevate(&mut self, principal: Arc<Principal>) -> ElevationGuard<'_> {
        let previous = self.active.replace(principal);
        self.depth += 1;
        ElevationGuard {
            ctx: self,
            previous: Some(previous),
        }
    }

    /// Identity of the current slot value, for before/after comparisons.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot(self.active.clone())
    }

    /// True when the active principal is the very same instance captured in
    /// `snapshot` (or both are empty).
    pub fn is_same_as(&self, snapshot: &ContextSnapshot) -> bool {
        match (&self.active, &snapshot.0) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn into_principal(self) -> Option<Arc<Principal>> {
        self.active
    }
}

/// Point-in-time capture of a context slot.
#[derive(Debug, Clone)]
pub struct ContextSnapshot(Option<Arc<Principal>>);

impl ContextSnapshot {
    pub fn principal(&self) -> Option<&Arc<Principal>> {
        self.0.as_ref()
    }
}

/// Scoped elevation of a [`SecurityContext`]; restores on drop.
#[must_use = "dropping the guard immediately ends the elevation"]
pub struct ElevationGuard<'a> {
    ctx: &'a mut SecurityContext,
    previous: Option<Option<Arc<Principal>>>,
}

impl Deref for ElevationGuard<'_> {
    type Target = SecurityContext;

    fn deref(&self) -> &SecurityContext {
        self.ctx
    }
}

impl DerefMut for ElevationGuard<'_> {
    fn deref_mut(&mut self) -> &mut SecurityContext {
        self.ctx
    }
}

impl Drop for ElevationGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.ctx.active = previous;
            self.ctx.depth -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantScope;

    fn system() -> Arc<Principal> {
        Arc::new(Principal::system("system", ["ROLE_SYSTEM"]))
    }

    #[test]
    fn elevation_restores_empty_context() {
        let mut ctx = SecurityContext::new();
        let before = ctx.snapshot();
        {
            let guard = ctx.elevate(system());
            assert!(guard.is_authenticated());
            assert_eq!(guard.elevation_depth(), 1);
        }
        assert!(!ctx.is_authenticated());
        assert!(ctx.is_same_as(&before));
        assert_eq!(ctx.elevation_depth(), 0);
    }

    #[test]
    fn nested_elevations_unwind_in_order() {
        let mut ctx = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
        let before = ctx.snapshot();
        {
            let mut outer = ctx.elevate(system());
            let tenant_system = Principal::system("system", ["ROLE_SYSTEM"])
                .with_tenant(TenantScope::new("t1"))
                .unwrap();
            {
                let inner = outer.elevate(Arc::new(tenant_system));
                assert_eq!(inner.tenant_id().unwrap().as_str(), "t1");
                assert_eq!(inner.elevation_depth(), 2);
            }
            assert!(outer.tenant_id().is_none());
            assert_eq!(outer.principal().unwrap().identity(), "system");
        }
        assert!(ctx.is_same_as(&before));
    }

    #[test]
    fn elevation_restores_on_early_return() {
        fn lookup(ctx: &mut SecurityContext) -> Result<(), &'static str> {
            let _guard = ctx.elevate(system());
            Err("lookup failed")
        }

        let mut ctx = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
        let before = ctx.snapshot();
        assert!(lookup(&mut ctx).is_err());
        assert!(ctx.is_same_as(&before));
    }

    #[test]
    fn elevation_restores_on_panic() {
        let mut ctx = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
        let before = ctx.snapshot();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.elevate(system());
            panic!("directory exploded");
        }));

        assert!(result.is_err());
        assert!(ctx.is_same_as(&before));
        assert_eq!(ctx.elevation_depth(), 0);
    }

    #[test]
    fn snapshots_compare_by_instance() {
        let ctx = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
        let other = SecurityContext::with_principal(Principal::user("alice", ["ROLE_USER"]));
        assert!(!ctx.is_same_as(&other.snapshot()));
        assert!(ctx.is_same_as(&ctx.snapshot()));
    }
}
