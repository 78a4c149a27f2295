//! dog-core: framework-agnostic core for DogRS.
//!
//! Identity, tenant and context types shared by the token gate (`dog-auth`),
//! the channel demultiplexer (`dog-demux`) and transport adapters
//! (`dog-axum`).

pub mod config;
pub mod context;
pub mod errors;
pub mod principal;
pub mod system;
pub mod tenant;

pub use config::{DogConfig, DogConfigSnapshot};
pub use context::{ContextSnapshot, ElevationGuard, SecurityContext};
pub use errors::{AdmissionError, DogError, ErrorKind};
pub use principal::{Authority, Principal, PrincipalKind, ScopeError};
pub use system::{StaticSystemIdentity, SystemIdentityProvider};
pub use tenant::{TenantId, TenantRecord, TenantScope, TenantStatus};
