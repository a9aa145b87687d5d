//! In-memory chain backends for tests.
//!
//! Each mock holds its state behind a `Mutex` so tests can mutate it while
//! the code under test holds a shared reference.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::domain::message::{GuardianSignature, PauseMessage, UnvetMessage};
use crate::domain::signing::MessagePrefixes;
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::{BlockNumber, Wei, GWEI};
use crate::infrastructure::chain::{
    BlockHeader, ChainReader, DepositVault, FeeHistory, FeeParams, LogEntry, ModuleVault,
    RelayClient, SecurityContract, StakingPool, StakingRouter, TxRequest, TxSubmitter,
};

fn poisoned() -> WardenError {
    WardenError::Message("mock lock poisoned".to_string())
}

#[derive(Default)]
struct MockChainState {
    head: Option<BlockHeader>,
    pending_base_fee: Wei,
    base_fees: BTreeMap<BlockNumber, Wei>,
    rewards: BTreeMap<BlockNumber, Vec<Wei>>,
    logs: Vec<(Address, LogEntry)>,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, number: BlockNumber, hash: B256, base_fee_per_gas: Wei) {
        let mut state = self.state.lock().unwrap();
        state.head = Some(BlockHeader {
            number,
            hash,
            timestamp: number * 12,
            base_fee_per_gas,
        });
        state.base_fees.insert(number, base_fee_per_gas);
    }

    pub fn advance_head(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(head) = state.head.as_mut() {
            head.number += 1;
            head.timestamp += 12;
            let mut hash = head.hash;
            hash.0[31] = hash.0[31].wrapping_add(1);
            head.hash = hash;
            let (number, base_fee) = (head.number, head.base_fee_per_gas);
            state.base_fees.insert(number, base_fee);
        }
    }

    pub fn clear_head(&self) {
        self.state.lock().unwrap().head = None;
    }

    pub fn set_pending_base_fee(&self, fee: Wei) {
        self.state.lock().unwrap().pending_base_fee = fee;
    }

    pub fn set_base_fee(&self, block: BlockNumber, fee: Wei) {
        self.state.lock().unwrap().base_fees.insert(block, fee);
    }

    /// Fills `count` blocks ending at `newest` with the same base fee and
    /// priority reward row.
    pub fn fill_fee_history(&self, newest: BlockNumber, count: u64, base_fee: Wei, reward: Wei) {
        let mut state = self.state.lock().unwrap();
        for block in newest.saturating_sub(count.saturating_sub(1))..=newest {
            state.base_fees.insert(block, base_fee);
            state.rewards.insert(block, vec![reward]);
        }
    }

    pub fn push_log(&self, address: Address, entry: LogEntry) {
        self.state.lock().unwrap().logs.push((address, entry));
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn latest_block(&self) -> Result<BlockHeader> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        state.head.ok_or_else(|| WardenError::BlockNotFound("latest".to_string()))
    }

    async fn pending_base_fee(&self) -> Result<Wei> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.pending_base_fee)
    }

    async fn fee_history(
        &self,
        block_count: u64,
        newest_block: BlockNumber,
        _reward_percentiles: &[f64],
    ) -> Result<FeeHistory> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        let oldest = newest_block.saturating_sub(block_count.saturating_sub(1));
        let mut base_fee_per_gas = Vec::new();
        let mut reward = Vec::new();
        let mut actual_oldest = None;
        for block in oldest..=newest_block {
            if let Some(fee) = state.base_fees.get(&block) {
                actual_oldest.get_or_insert(block);
                base_fee_per_gas.push(*fee);
                reward.push(state.rewards.get(&block).cloned().unwrap_or_else(|| vec![GWEI]));
            }
        }
        Ok(FeeHistory {
            oldest_block: actual_oldest.unwrap_or(oldest),
            base_fee_per_gas,
            reward,
        })
    }

    async fn logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<Vec<LogEntry>> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state
            .logs
            .iter()
            .filter(|(addr, entry)| {
                *addr == address
                    && entry.block_number >= from_block
                    && entry.block_number <= to_block
                    && entry.topics.first().is_some_and(|t| topics.contains(t))
            })
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

#[derive(Default)]
struct MockSubmitterState {
    estimate: Option<u64>,
    reverting_prefix: Option<Vec<u8>>,
    submitted: Vec<(TxRequest, FeeParams, u64)>,
    inclusion_outcomes: VecDeque<bool>,
}

/// Public-mempool submitter that records what it was asked to send.
#[derive(Default)]
pub struct MockSubmitter {
    state: Mutex<MockSubmitterState>,
    fail_submit: AtomicBool,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_estimate(&self, gas: u64) {
        self.state.lock().unwrap().estimate = Some(gas);
    }

    /// Makes `estimate_gas` report a revert.
    pub fn set_reverting(&self) {
        self.state.lock().unwrap().estimate = None;
    }

    /// Makes `estimate_gas` revert only for calldata starting with `prefix`.
    pub fn set_reverting_calldata(&self, prefix: Vec<u8>) {
        self.state.lock().unwrap().reverting_prefix = Some(prefix);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// Queues the outcome of the next `wait_for_inclusion` call; defaults to
    /// included when the queue is empty.
    pub fn push_inclusion_outcome(&self, included: bool) {
        self.state.lock().unwrap().inclusion_outcomes.push_back(included);
    }

    pub fn submissions(&self) -> Vec<(TxRequest, FeeParams, u64)> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl TxSubmitter for MockSubmitter {
    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        if let Some(prefix) = &state.reverting_prefix {
            if tx.calldata.starts_with(prefix) {
                return Err(WardenError::CallReverted("mock revert".to_string()));
            }
        }
        state.estimate.ok_or_else(|| WardenError::CallReverted("mock revert".to_string()))
    }

    async fn submit(&self, tx: &TxRequest, fees: &FeeParams, gas_limit: u64) -> Result<B256> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(WardenError::RpcError("mock submit failure".to_string()));
        }
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        state.submitted.push((tx.clone(), *fees, gas_limit));
        let mut hash = B256::ZERO;
        hash.0[31] = state.submitted.len() as u8;
        Ok(hash)
    }

    async fn wait_for_inclusion(&self, _tx_hash: B256, _timeout: Duration) -> Result<bool> {
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.inclusion_outcomes.pop_front().unwrap_or(true))
    }
}

#[derive(Default)]
pub struct MockRelay {
    bundles: Mutex<Vec<(TxRequest, FeeParams, u64, Range<BlockNumber>)>>,
    fail: AtomicBool,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn bundles(&self) -> Vec<(TxRequest, FeeParams, u64, Range<BlockNumber>)> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayClient for MockRelay {
    async fn submit_bundle(
        &self,
        tx: &TxRequest,
        fees: &FeeParams,
        gas_limit: u64,
        target_blocks: Range<BlockNumber>,
    ) -> Result<B256> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WardenError::RelayError("mock relay down".to_string()));
        }
        let mut bundles = self.bundles.lock().map_err(|_| poisoned())?;
        bundles.push((tx.clone(), *fees, gas_limit, target_blocks));
        let mut hash = B256::ZERO;
        hash.0[30] = bundles.len() as u8;
        Ok(hash)
    }
}

struct MockSecurityState {
    guardians: Vec<Address>,
    quorum: usize,
    prefixes: MessagePrefixes,
    protocol_paused: bool,
    paused_modules: Vec<u64>,
    deposit_blocked_modules: Vec<u64>,
}

pub struct MockSecurity {
    address: Address,
    state: Mutex<MockSecurityState>,
}

impl MockSecurity {
    pub fn new(guardians: Vec<Address>, quorum: usize, prefixes: MessagePrefixes) -> Self {
        MockSecurity {
            address: Address::repeat_byte(0x5e),
            state: Mutex::new(MockSecurityState {
                guardians,
                quorum,
                prefixes,
                protocol_paused: false,
                paused_modules: Vec::new(),
                deposit_blocked_modules: Vec::new(),
            }),
        }
    }

    pub fn set_guardians(&self, guardians: Vec<Address>) {
        self.state.lock().unwrap().guardians = guardians;
    }

    pub fn set_protocol_paused(&self, paused: bool) {
        self.state.lock().unwrap().protocol_paused = paused;
    }

    pub fn set_module_paused(&self, module_id: u64, paused: bool) {
        let mut state = self.state.lock().unwrap();
        state.paused_modules.retain(|id| *id != module_id);
        if paused {
            state.paused_modules.push(module_id);
        }
    }

    pub fn set_deposit_blocked(&self, module_id: u64, blocked: bool) {
        let mut state = self.state.lock().unwrap();
        state.deposit_blocked_modules.retain(|id| *id != module_id);
        if blocked {
            state.deposit_blocked_modules.push(module_id);
        }
    }
}

#[async_trait]
impl SecurityContract for MockSecurity {
    async fn guardians(&self) -> Result<Vec<Address>> {
        Ok(self.state.lock().map_err(|_| poisoned())?.guardians.clone())
    }

    async fn quorum_threshold(&self) -> Result<usize> {
        Ok(self.state.lock().map_err(|_| poisoned())?.quorum)
    }

    async fn message_prefixes(&self) -> Result<MessagePrefixes> {
        Ok(self.state.lock().map_err(|_| poisoned())?.prefixes)
    }

    async fn can_deposit(&self, module_id: u64) -> Result<bool> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(!state.protocol_paused && !state.deposit_blocked_modules.contains(&module_id))
    }

    async fn is_protocol_paused(&self) -> Result<bool> {
        Ok(self.state.lock().map_err(|_| poisoned())?.protocol_paused)
    }

    async fn is_module_paused(&self, module_id: u64) -> Result<bool> {
        Ok(self.state.lock().map_err(|_| poisoned())?.paused_modules.contains(&module_id))
    }

    fn deposit_tx(
        &self,
        block_number: BlockNumber,
        block_hash: B256,
        deposit_root: B256,
        staking_module_id: u64,
        nonce: u64,
        sorted_signatures: &[GuardianSignature],
    ) -> TxRequest {
        let mut calldata = b"deposit".to_vec();
        calldata.extend_from_slice(&block_number.to_be_bytes());
        calldata.extend_from_slice(block_hash.as_slice());
        calldata.extend_from_slice(deposit_root.as_slice());
        calldata.extend_from_slice(&staking_module_id.to_be_bytes());
        calldata.extend_from_slice(&nonce.to_be_bytes());
        for sig in sorted_signatures {
            calldata.extend_from_slice(sig.r.as_slice());
            calldata.extend_from_slice(sig.vs.as_slice());
        }
        TxRequest { to: self.address, calldata, value: 0 }
    }

    fn pause_tx(&self, msg: &PauseMessage) -> TxRequest {
        let mut calldata = b"pause".to_vec();
        calldata.extend_from_slice(&msg.block_number.to_be_bytes());
        if let Some(module_id) = msg.staking_module_id {
            calldata.extend_from_slice(&module_id.to_be_bytes());
        }
        calldata.extend_from_slice(msg.signature.r.as_slice());
        calldata.extend_from_slice(msg.signature.vs.as_slice());
        TxRequest { to: self.address, calldata, value: 0 }
    }

    fn unvet_tx(&self, msg: &UnvetMessage) -> TxRequest {
        let mut calldata = b"unvet".to_vec();
        calldata.extend_from_slice(&msg.block_number.to_be_bytes());
        calldata.extend_from_slice(msg.block_hash.as_slice());
        calldata.extend_from_slice(&msg.staking_module_id.to_be_bytes());
        calldata.extend_from_slice(&msg.nonce.to_be_bytes());
        calldata.extend_from_slice(&msg.operator_ids);
        calldata.extend_from_slice(&msg.vetted_keys_by_operator);
        calldata.extend_from_slice(msg.signature.r.as_slice());
        calldata.extend_from_slice(msg.signature.vs.as_slice());
        TxRequest { to: self.address, calldata, value: 0 }
    }
}

#[derive(Default)]
struct MockRouterState {
    nonces: HashMap<u64, u64>,
    inactive: Vec<u64>,
    depositable_keys: HashMap<u64, u64>,
    validator_gaps: HashMap<u64, u64>,
}

#[derive(Default)]
pub struct MockRouter {
    state: Mutex<MockRouterState>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nonce(&self, module_id: u64, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(module_id, nonce);
    }

    pub fn set_active(&self, module_id: u64, active: bool) {
        let mut state = self.state.lock().unwrap();
        state.inactive.retain(|id| *id != module_id);
        if !active {
            state.inactive.push(module_id);
        }
    }

    pub fn set_depositable_keys(&self, module_id: u64, keys: u64) {
        self.state.lock().unwrap().depositable_keys.insert(module_id, keys);
    }

    pub fn set_validator_gap(&self, module_id: u64, gap: u64) {
        self.state.lock().unwrap().validator_gaps.insert(module_id, gap);
    }
}

#[async_trait]
impl StakingRouter for MockRouter {
    async fn module_ids(&self) -> Result<Vec<u64>> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        let mut ids: Vec<u64> = state.nonces.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn is_module_active(&self, module_id: u64) -> Result<bool> {
        Ok(!self.state.lock().map_err(|_| poisoned())?.inactive.contains(&module_id))
    }

    async fn module_nonce(&self, module_id: u64) -> Result<u64> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.nonces.get(&module_id).copied().unwrap_or(0))
    }

    async fn depositable_keys(&self, module_id: u64) -> Result<u64> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.depositable_keys.get(&module_id).copied().unwrap_or(0))
    }

    async fn validator_gap(&self, module_id: u64) -> Result<u64> {
        let state = self.state.lock().map_err(|_| poisoned())?;
        Ok(state.validator_gaps.get(&module_id).copied().unwrap_or(0))
    }
}

#[derive(Default)]
struct MockPoolState {
    depositable_ether: Wei,
    buffered_ether: Wei,
    unfinalized_withdrawals: Wei,
}

#[derive(Default)]
pub struct MockPool {
    state: Mutex<MockPoolState>,
}

impl MockPool {
    pub fn new(depositable_ether: Wei) -> Self {
        MockPool {
            state: Mutex::new(MockPoolState {
                depositable_ether,
                buffered_ether: depositable_ether,
                unfinalized_withdrawals: 0,
            }),
        }
    }

    pub fn set_depositable_ether(&self, value: Wei) {
        self.state.lock().unwrap().depositable_ether = value;
    }

    pub fn set_buffered_ether(&self, value: Wei) {
        self.state.lock().unwrap().buffered_ether = value;
    }

    pub fn set_unfinalized_withdrawals(&self, value: Wei) {
        self.state.lock().unwrap().unfinalized_withdrawals = value;
    }
}

#[async_trait]
impl StakingPool for MockPool {
    async fn depositable_ether(&self) -> Result<Wei> {
        Ok(self.state.lock().map_err(|_| poisoned())?.depositable_ether)
    }

    async fn buffered_ether(&self) -> Result<Wei> {
        Ok(self.state.lock().map_err(|_| poisoned())?.buffered_ether)
    }

    async fn unfinalized_withdrawals(&self) -> Result<Wei> {
        Ok(self.state.lock().map_err(|_| poisoned())?.unfinalized_withdrawals)
    }
}

pub struct MockModuleVault {
    module_id: u64,
    balance: Mutex<Wei>,
}

impl MockModuleVault {
    pub fn new(module_id: u64, balance: Wei) -> Self {
        MockModuleVault { module_id, balance: Mutex::new(balance) }
    }

    pub fn set_balance(&self, value: Wei) {
        *self.balance.lock().unwrap() = value;
    }
}

#[async_trait]
impl ModuleVault for MockModuleVault {
    fn module_id(&self) -> u64 {
        self.module_id
    }

    async fn balance(&self) -> Result<Wei> {
        Ok(*self.balance.lock().map_err(|_| poisoned())?)
    }

    fn direct_deposit_tx(
        &self,
        block_number: BlockNumber,
        block_hash: B256,
        deposit_root: B256,
        nonce: u64,
        sorted_signatures: &[GuardianSignature],
    ) -> TxRequest {
        let mut calldata = b"direct".to_vec();
        calldata.extend_from_slice(&block_number.to_be_bytes());
        calldata.extend_from_slice(block_hash.as_slice());
        calldata.extend_from_slice(deposit_root.as_slice());
        calldata.extend_from_slice(&self.module_id.to_be_bytes());
        calldata.extend_from_slice(&nonce.to_be_bytes());
        for sig in sorted_signatures {
            calldata.extend_from_slice(sig.r.as_slice());
            calldata.extend_from_slice(sig.vs.as_slice());
        }
        TxRequest { to: Address::repeat_byte(0x6a), calldata, value: 0 }
    }
}

pub struct MockVault {
    deposit_root: Mutex<B256>,
}

impl MockVault {
    pub fn new(deposit_root: B256) -> Self {
        MockVault { deposit_root: Mutex::new(deposit_root) }
    }

    pub fn set_deposit_root(&self, root: B256) {
        *self.deposit_root.lock().unwrap() = root;
    }
}

#[async_trait]
impl DepositVault for MockVault {
    async fn deposit_root(&self) -> Result<B256> {
        Ok(*self.deposit_root.lock().map_err(|_| poisoned())?)
    }
}
