//! Outbound reply delivery.

pub mod port;
pub mod throttled;
