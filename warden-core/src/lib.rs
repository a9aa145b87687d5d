//! Core engine for the warden daemon: guardian message ingestion and
//! validation, quorum formation, deposit decision strategies and the
//! fallback-aware transaction sender, driven by a block-cadence executor.
//!
//! The blockchain RPC client, contract bindings and the process entry point
//! are external collaborators; this crate talks to them through the traits in
//! [`infrastructure::chain`].

pub mod application;
pub mod domain;
pub mod foundation;
pub mod infrastructure;
pub mod testkit;

pub use foundation::error::{ErrorCode, Result, WardenError};
