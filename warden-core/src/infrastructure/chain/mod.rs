//! Chain access traits.
//!
//! Everything the engine needs from the execution layer and the protocol
//! contracts goes through these traits. Production code backs them with an
//! RPC client and contract bindings; tests use the mocks in [`mock`].

pub mod mock;

use std::ops::Range;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::domain::message::{PauseMessage, UnvetMessage};
use crate::domain::signing::MessagePrefixes;
use crate::foundation::error::Result;
use crate::foundation::types::{BlockNumber, Wei};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: BlockNumber,
    pub hash: B256,
    pub timestamp: u64,
    pub base_fee_per_gas: Wei,
}

/// Result of an `eth_feeHistory`-style query.
#[derive(Debug, Clone, Default)]
pub struct FeeHistory {
    pub oldest_block: BlockNumber,
    pub base_fee_per_gas: Vec<Wei>,
    /// One row per block, one entry per requested percentile.
    pub reward: Vec<Vec<Wei>>,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub block_number: BlockNumber,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// An unsigned transaction the sender still has to price and sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub calldata: Vec<u8>,
    pub value: Wei,
}

/// EIP-1559 fee fields chosen by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: Wei,
    pub max_priority_fee_per_gas: Wei,
}

/// Read-only execution-layer access.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block(&self) -> Result<BlockHeader>;

    /// Base fee of the pending block.
    async fn pending_base_fee(&self) -> Result<Wei>;

    /// Fee history ending at `newest_block` (inclusive), covering up to
    /// `block_count` blocks, with per-block rewards at `reward_percentiles`.
    async fn fee_history(
        &self,
        block_count: u64,
        newest_block: BlockNumber,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory>;

    async fn logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<Vec<LogEntry>>;
}

/// Public-mempool transaction path.
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Simulates the transaction from our account. A revert surfaces as
    /// [`crate::WardenError::CallReverted`].
    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64>;

    async fn submit(&self, tx: &TxRequest, fees: &FeeParams, gas_limit: u64) -> Result<B256>;

    /// Waits until the transaction lands or `timeout` elapses. `Ok(true)`
    /// means included and successful.
    async fn wait_for_inclusion(&self, tx_hash: B256, timeout: Duration) -> Result<bool>;
}

/// Private relay path. Bundles are invisible until included, so failure is
/// only observable as the inclusion deadline passing.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Submits the transaction as single-tx bundles targeting every block in
    /// `target_blocks`.
    async fn submit_bundle(
        &self,
        tx: &TxRequest,
        fees: &FeeParams,
        gas_limit: u64,
        target_blocks: Range<BlockNumber>,
    ) -> Result<B256>;
}

/// The security contract: guardian registry, message prefixes, pause state
/// and the transactions the engine submits against it.
#[async_trait]
pub trait SecurityContract: Send + Sync {
    async fn guardians(&self) -> Result<Vec<Address>>;
    async fn quorum_threshold(&self) -> Result<usize>;
    async fn message_prefixes(&self) -> Result<MessagePrefixes>;

    /// Whether deposits to `module_id` are currently allowed.
    async fn can_deposit(&self, module_id: u64) -> Result<bool>;
    async fn is_protocol_paused(&self) -> Result<bool>;
    async fn is_module_paused(&self, module_id: u64) -> Result<bool>;

    /// Builds the deposit transaction from a quorum of signatures, already
    /// sorted by ascending guardian address.
    fn deposit_tx(
        &self,
        block_number: BlockNumber,
        block_hash: B256,
        deposit_root: B256,
        staking_module_id: u64,
        nonce: u64,
        sorted_signatures: &[crate::domain::message::GuardianSignature],
    ) -> TxRequest;

    fn pause_tx(&self, msg: &PauseMessage) -> TxRequest;
    fn unvet_tx(&self, msg: &UnvetMessage) -> TxRequest;
}

/// Module registry reads.
#[async_trait]
pub trait StakingRouter: Send + Sync {
    async fn module_ids(&self) -> Result<Vec<u64>>;
    async fn is_module_active(&self, module_id: u64) -> Result<bool>;
    async fn module_nonce(&self, module_id: u64) -> Result<u64>;
    /// Validator keys the module could use right now, given unlimited ether.
    async fn depositable_keys(&self, module_id: u64) -> Result<u64>;
    /// Deposited-minus-exited validator count. Modules with a smaller gap
    /// are underallocated and deposit first.
    async fn validator_gap(&self, module_id: u64) -> Result<u64>;
}

/// Protocol-wide capital view.
#[async_trait]
pub trait StakingPool: Send + Sync {
    async fn depositable_ether(&self) -> Result<Wei>;
    async fn buffered_ether(&self) -> Result<Wei>;
    /// Withdrawal requests not yet covered by the buffer.
    async fn unfinalized_withdrawals(&self) -> Result<Wei>;
}

/// Auxiliary capital vault backing a single staking module.
///
/// A module with a vault gets a direct-deposit transaction tried ahead of
/// the standard path; any precondition or submission failure falls back.
#[async_trait]
pub trait ModuleVault: Send + Sync {
    fn module_id(&self) -> u64;
    async fn balance(&self) -> Result<Wei>;

    /// Builds the direct-deposit transaction from the same quorum of
    /// signatures the standard path would use.
    fn direct_deposit_tx(
        &self,
        block_number: BlockNumber,
        block_hash: B256,
        deposit_root: B256,
        nonce: u64,
        sorted_signatures: &[crate::domain::message::GuardianSignature],
    ) -> TxRequest;
}

/// The beacon-chain deposit contract.
#[async_trait]
pub trait DepositVault: Send + Sync {
    async fn deposit_root(&self) -> Result<B256>;
}
