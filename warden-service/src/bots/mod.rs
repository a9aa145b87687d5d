//! Long-running bots.
//!
//! Each bot owns a message store fed by its transports and implements one
//! cycle of work against a block header; the block-cadence executor drives
//! the cycle. Bots share nothing but the chain backends, so they can run in
//! separate tasks or separate processes.

pub mod depositor;
pub mod pauser;
pub mod unvetter;

pub use depositor::DepositorBot;
pub use pauser::PauserBot;
pub use unvetter::UnvetterBot;
