//! Service layer for the warden daemon.
//!
//! Wires the core engine into long-running bots, exposes prometheus
//! metrics, and owns process setup (logging, config loading). The actual
//! entry point binary stays external; everything here is callable as a
//! library.

pub mod bots;
pub mod metrics;
pub mod setup;
