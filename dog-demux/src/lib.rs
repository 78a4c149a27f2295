//! dog-demux: route calls to per-tenant backend channels.
//!
//! A [`MultitenantDemux`] fronts one logical service. Infrastructure registers
//! [`ApiChannel`]s in a shared [`ChannelRegistry`]; callers ask the demux for
//! a ready channel for their tenant and wait, bounded, until one appears.

pub mod channel;
pub mod config;
pub mod demux;
pub mod registry;

pub use channel::{ApiChannel, ChannelBinding, ToggleChannel};
pub use config::DemuxConfig;
pub use demux::{MultitenantDemux, WaitState};
pub use registry::{is_channel_match, ChannelId, ChannelRegistry};
