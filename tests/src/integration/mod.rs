//! # Integration Flows
//!
//! End-to-end behaviour of a [`link_engine::DeviceClient`] against a
//! recording transport. Timing-based flows use real time with generous
//! margins, since user code runs on the blocking pool.

pub mod command_flows;
pub mod lifecycle_flows;
pub mod race;
