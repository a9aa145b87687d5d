//! Scalar aliases shared across the crate.

/// Amount in wei. u128 covers the full range of realistic balances and fees.
pub type Wei = u128;

/// Execution-layer block height.
pub type BlockNumber = u64;

/// One gwei in wei.
pub const GWEI: Wei = 1_000_000_000;

/// One ether in wei.
pub const ETHER: Wei = 1_000_000_000_000_000_000;
