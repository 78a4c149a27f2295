//! dog-axum: Axum adapter for DogRS.
//!
//! Puts the token gate in front of an Axum router and exposes the admitted
//! principal and tenant channels to handlers.

pub mod app;
pub mod extract;
pub mod middlewares;
pub mod state;
mod error;
pub use error::DogAxumError;
pub use extract::{CurrentPrincipal, RequestSecurity};
pub use middlewares::gate_layer;
pub use state::DogAxumState;

pub use app::{axum, AxumApp};
