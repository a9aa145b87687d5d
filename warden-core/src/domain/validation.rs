//! Message actualization against the current chain state.
//!
//! Signature validity is necessary but not sufficient: a message must also
//! come from a current guardian, be recent, and describe on-chain state that
//! still holds. These checks re-run every tick because all three inputs move.

use alloy_primitives::{Address, B256};

use crate::domain::message::{DepositMessage, PauseMessage, PingMessage, UnvetMessage};
use crate::foundation::constants::MESSAGE_STALENESS_WINDOW_BLOCKS;
use crate::foundation::types::BlockNumber;

/// Chain state a deposit message is judged against.
#[derive(Debug, Clone, Copy)]
pub struct DepositContext {
    pub head_block: BlockNumber,
    pub deposit_root: B256,
    pub module_nonce: u64,
}

pub fn is_fresh(message_block: BlockNumber, head_block: BlockNumber) -> bool {
    message_block + MESSAGE_STALENESS_WINDOW_BLOCKS >= head_block
}

pub fn is_known_guardian(guardian: Address, guardians: &[Address]) -> bool {
    guardians.contains(&guardian)
}

/// A deposit message stays actual while its guardian is current, it is
/// fresh, its deposit root still matches (only checkable once its block is
/// at or below the head), and its nonce has not been consumed. A nonce ahead
/// of the chain is tolerated; the module may catch up before submission.
pub fn is_deposit_actual(
    msg: &DepositMessage,
    ctx: &DepositContext,
    guardians: &[Address],
) -> bool {
    if !is_known_guardian(msg.guardian, guardians) {
        return false;
    }
    if !is_fresh(msg.block_number, ctx.head_block) {
        return false;
    }
    if msg.block_number <= ctx.head_block && msg.deposit_root != ctx.deposit_root {
        return false;
    }
    msg.nonce >= ctx.module_nonce
}

pub fn is_pause_actual(msg: &PauseMessage, head_block: BlockNumber, guardians: &[Address]) -> bool {
    is_known_guardian(msg.guardian, guardians) && is_fresh(msg.block_number, head_block)
}

/// Unvet messages bind to an exact module nonce; once the module rotates the
/// transaction would revert, so anything but an exact match is dropped.
pub fn is_unvet_actual(
    msg: &UnvetMessage,
    head_block: BlockNumber,
    module_nonce: u64,
    guardians: &[Address],
) -> bool {
    is_known_guardian(msg.guardian, guardians)
        && is_fresh(msg.block_number, head_block)
        && msg.nonce == module_nonce
}

/// Pings carry no signature, so guardian membership is the only thing
/// keeping arbitrary addresses off the liveness gauge.
pub fn is_ping_actual(msg: &PingMessage, head_block: BlockNumber, guardians: &[Address]) -> bool {
    is_known_guardian(msg.guardian, guardians) && is_fresh(msg.block_number, head_block)
}
