//! Quorum formation over guardian-signed messages.
//!
//! Messages only count toward the same quorum when they attest to the same
//! chain view, keyed by `(block_number, block_hash)`. Within a group each
//! guardian counts once. Grouping runs over a `BTreeMap` so the outcome is
//! the same regardless of arrival order.

use std::collections::{BTreeMap, HashSet};
use std::num::NonZeroUsize;

use alloy_primitives::{Address, B256};

use crate::domain::message::DepositMessage;
use crate::foundation::types::BlockNumber;

pub trait QuorumMember {
    /// The chain view this message attests to.
    fn group_key(&self) -> (BlockNumber, B256);
    fn guardian(&self) -> Address;
}

impl QuorumMember for DepositMessage {
    fn group_key(&self) -> (BlockNumber, B256) {
        (self.block_number, self.block_hash)
    }

    fn guardian(&self) -> Address {
        self.guardian
    }
}

#[derive(Debug)]
pub struct QuorumOutcome<'a, M> {
    /// Distinct-guardian messages of the strongest group.
    pub messages: Vec<&'a M>,
    /// Whether the strongest group reached the threshold.
    pub ready: bool,
    pub best_group_size: usize,
}

/// Picks the strongest same-view group among `messages`.
///
/// Ties on group size resolve to the higher block number, so a quorum that
/// re-forms on a newer block wins over an equally large stale one.
pub fn form_quorum<'a, M: QuorumMember>(
    messages: &'a [M],
    threshold: NonZeroUsize,
) -> QuorumOutcome<'a, M> {
    let mut groups: BTreeMap<(BlockNumber, B256), Vec<&'a M>> = BTreeMap::new();
    let mut seen: HashSet<((BlockNumber, B256), Address)> = HashSet::new();
    for msg in messages {
        let key = msg.group_key();
        if seen.insert((key, msg.guardian())) {
            groups.entry(key).or_default().push(msg);
        }
    }

    let best = groups
        .into_iter()
        .max_by_key(|((block_number, _), group)| (group.len(), *block_number));

    match best {
        Some((_, group)) => {
            let size = group.len();
            QuorumOutcome { messages: group, ready: size >= threshold.get(), best_group_size: size }
        }
        None => QuorumOutcome { messages: Vec::new(), ready: false, best_group_size: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::GuardianSignature;

    fn msg(block_number: u64, hash_byte: u8, guardian_byte: u8) -> DepositMessage {
        DepositMessage {
            block_number,
            block_hash: B256::repeat_byte(hash_byte),
            deposit_root: B256::repeat_byte(0xdd),
            staking_module_id: 1,
            nonce: 1,
            guardian: Address::repeat_byte(guardian_byte),
            signature: GuardianSignature { r: B256::ZERO, vs: B256::ZERO },
        }
    }

    fn threshold(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn duplicate_guardians_count_once() {
        let msgs = vec![msg(100, 0xaa, 1), msg(100, 0xaa, 1), msg(100, 0xaa, 1)];
        let outcome = form_quorum(&msgs, threshold(2));
        assert_eq!(outcome.best_group_size, 1);
        assert!(!outcome.ready);
    }

    #[test]
    fn differing_views_never_merge() {
        let msgs = vec![msg(100, 0xaa, 1), msg(100, 0xbb, 2), msg(101, 0xaa, 3)];
        let outcome = form_quorum(&msgs, threshold(2));
        assert_eq!(outcome.best_group_size, 1);
        assert!(!outcome.ready);
    }

    #[test]
    fn largest_group_wins() {
        let msgs = vec![
            msg(100, 0xaa, 1),
            msg(100, 0xaa, 2),
            msg(100, 0xaa, 3),
            msg(101, 0xbb, 4),
            msg(101, 0xbb, 5),
        ];
        let outcome = form_quorum(&msgs, threshold(3));
        assert!(outcome.ready);
        assert_eq!(outcome.best_group_size, 3);
        assert!(outcome.messages.iter().all(|m| m.block_number == 100));
    }

    #[test]
    fn size_tie_resolves_to_higher_block() {
        let msgs =
            vec![msg(100, 0xaa, 1), msg(100, 0xaa, 2), msg(105, 0xbb, 3), msg(105, 0xbb, 4)];
        let outcome = form_quorum(&msgs, threshold(2));
        assert!(outcome.ready);
        assert!(outcome.messages.iter().all(|m| m.block_number == 105));
    }

    #[test]
    fn outcome_is_arrival_order_independent() {
        let mut msgs =
            vec![msg(100, 0xaa, 1), msg(105, 0xbb, 3), msg(100, 0xaa, 2), msg(105, 0xbb, 4)];
        let forward = form_quorum(&msgs, threshold(2));
        let forward_guardians: Vec<_> = forward.messages.iter().map(|m| m.guardian).collect();
        msgs.reverse();
        let reversed = form_quorum(&msgs, threshold(2));
        let mut reversed_guardians: Vec<_> = reversed.messages.iter().map(|m| m.guardian).collect();
        reversed_guardians.reverse();
        assert_eq!(forward_guardians, reversed_guardians);
    }

    #[test]
    fn threshold_one_is_satisfied_by_any_message() {
        let msgs = vec![msg(100, 0xaa, 1)];
        let outcome = form_quorum(&msgs, threshold(1));
        assert!(outcome.ready);
    }

    #[test]
    fn threshold_five_needs_five_distinct_guardians() {
        let mut msgs: Vec<DepositMessage> = (1..=4).map(|g| msg(100, 0xaa, g)).collect();
        // A repeat of guardian 4 must not tip the balance.
        msgs.push(msg(100, 0xaa, 4));
        let outcome = form_quorum(&msgs, threshold(5));
        assert!(!outcome.ready);
        assert_eq!(outcome.best_group_size, 4);

        msgs.push(msg(100, 0xaa, 5));
        let outcome = form_quorum(&msgs, threshold(5));
        assert!(outcome.ready);
        assert_eq!(outcome.best_group_size, 5);
    }

    #[test]
    fn empty_input_yields_no_quorum() {
        let msgs: Vec<DepositMessage> = Vec::new();
        let outcome = form_quorum(&msgs, threshold(1));
        assert!(!outcome.ready);
        assert_eq!(outcome.best_group_size, 0);
    }
}
