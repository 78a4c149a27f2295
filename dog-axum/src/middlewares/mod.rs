pub mod gate;

pub use gate::{gate_layer, TokenGate, TokenGateService};
