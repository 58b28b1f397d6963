//! Cloud relay: the single outbound control connection and its dispatch loop

pub mod client;
pub mod protocol;

pub use client::{Backoff, RelayClient};
pub use protocol::{HealthStatus, Inbound, Outbound};
