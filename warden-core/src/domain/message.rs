//! Guardian message model.
//!
//! Every transport normalizes its payloads into [`GuardianMessage`] before
//! anything downstream sees them. Construction implies schema validity only;
//! signature checks happen separately in [`crate::domain::signing`].

use alloy_primitives::{Address, B256};

use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::BlockNumber;

/// Compact ECDSA signature in (r, vs) form, the layout the on-chain
/// contracts consume. The recovery bit lives in the top bit of `vs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardianSignature {
    pub r: B256,
    pub vs: B256,
}

impl GuardianSignature {
    /// Folds a (v, r, s) signature into (r, vs).
    ///
    /// Accepts `v` as 0/1 or 27/28; anything else is rejected.
    pub fn from_vrs(v: u64, r: B256, s: B256) -> Result<Self> {
        let v = if v < 2 { v + 27 } else { v };
        if v != 27 && v != 28 {
            return Err(WardenError::InvalidVByte(v));
        }
        let mut vs = s;
        if v % 2 == 0 {
            vs.0[0] |= 0x80;
        }
        Ok(GuardianSignature { r, vs })
    }

    /// Unfolds (r, vs) back into the recovery id and the low-s component.
    pub fn split(&self) -> (i32, B256, B256) {
        let recid = (self.vs.0[0] >> 7) as i32;
        let mut s = self.vs;
        s.0[0] &= 0x7f;
        (recid, self.r, s)
    }
}

/// Discriminates message families across transports and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Deposit,
    Pause,
    Unvet,
    Ping,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Deposit => "deposit",
            MessageKind::Pause => "pause",
            MessageKind::Unvet => "unvet",
            MessageKind::Ping => "ping",
        }
    }
}

/// Authorization to perform a deposit for one staking module at one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositMessage {
    pub block_number: BlockNumber,
    pub block_hash: B256,
    pub deposit_root: B256,
    pub staking_module_id: u64,
    pub nonce: u64,
    pub guardian: Address,
    pub signature: GuardianSignature,
}

/// Request to pause deposits, either for one module or protocol-wide.
///
/// `staking_module_id` is present on the module-scoped schema and absent on
/// the newer protocol-wide one; the packed hash differs accordingly.
/// `block_hash` is informational: it participates in neither the digest nor
/// the submitted transaction, and some publishers omit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseMessage {
    pub block_number: BlockNumber,
    pub block_hash: Option<B256>,
    pub staking_module_id: Option<u64>,
    pub guardian: Address,
    pub signature: GuardianSignature,
}

/// Request to unvet signing keys of specific node operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnvetMessage {
    pub block_number: BlockNumber,
    pub block_hash: B256,
    pub staking_module_id: u64,
    pub nonce: u64,
    pub operator_ids: Vec<u8>,
    pub vetted_keys_by_operator: Vec<u8>,
    pub guardian: Address,
    pub signature: GuardianSignature,
}

/// Liveness beacon. Carries no signature and authorizes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingMessage {
    pub block_number: BlockNumber,
    pub guardian: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardianMessage {
    Deposit(DepositMessage),
    Pause(PauseMessage),
    Unvet(UnvetMessage),
    Ping(PingMessage),
}

impl GuardianMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            GuardianMessage::Deposit(_) => MessageKind::Deposit,
            GuardianMessage::Pause(_) => MessageKind::Pause,
            GuardianMessage::Unvet(_) => MessageKind::Unvet,
            GuardianMessage::Ping(_) => MessageKind::Ping,
        }
    }

    pub fn guardian(&self) -> Address {
        match self {
            GuardianMessage::Deposit(m) => m.guardian,
            GuardianMessage::Pause(m) => m.guardian,
            GuardianMessage::Unvet(m) => m.guardian,
            GuardianMessage::Ping(m) => m.guardian,
        }
    }

    pub fn block_number(&self) -> BlockNumber {
        match self {
            GuardianMessage::Deposit(m) => m.block_number,
            GuardianMessage::Pause(m) => m.block_number,
            GuardianMessage::Unvet(m) => m.block_number,
            GuardianMessage::Ping(m) => m.block_number,
        }
    }
}
