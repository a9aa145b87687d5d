//! Deterministic fixtures for tests: guardian keypairs and signed messages.
//!
//! Shipped in the library so integration tests and downstream crates share
//! the same fixtures.

use alloy_primitives::{keccak256, Address, B256};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};

use crate::domain::message::{DepositMessage, GuardianSignature, PauseMessage, UnvetMessage};
use crate::domain::signing::{deposit_digest, pause_digest, unvet_digest, MessagePrefixes};
use crate::foundation::types::BlockNumber;

/// A guardian keypair derived from a one-byte seed.
#[derive(Debug, Clone, Copy)]
pub struct GuardianKey {
    secret: SecretKey,
}

impl GuardianKey {
    pub fn from_seed(seed: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[31] = seed.max(1);
        let secret = SecretKey::from_slice(&bytes)
            .unwrap_or_else(|_| panic!("seed {seed} does not form a valid secret key"));
        GuardianKey { secret }
    }

    pub fn address(&self) -> Address {
        let pubkey = PublicKey::from_secret_key(SECP256K1, &self.secret);
        let hashed = keccak256(&pubkey.serialize_uncompressed()[1..]);
        Address::from_slice(&hashed[12..])
    }

    /// Signs a digest and folds the result into (r, vs) form.
    pub fn sign_digest(&self, digest: B256) -> GuardianSignature {
        let msg = Message::from_digest(digest.0);
        let sig = SECP256K1.sign_ecdsa_recoverable(&msg, &self.secret);
        let (recid, compact) = sig.serialize_compact();
        let r = B256::from_slice(&compact[..32]);
        let mut vs = B256::from_slice(&compact[32..]);
        if recid.to_i32() == 1 {
            vs.0[0] |= 0x80;
        }
        GuardianSignature { r, vs }
    }

    pub fn signed_deposit(
        &self,
        prefixes: &MessagePrefixes,
        block_number: BlockNumber,
        block_hash: B256,
        deposit_root: B256,
        staking_module_id: u64,
        nonce: u64,
    ) -> DepositMessage {
        let digest = deposit_digest(
            prefixes.deposit,
            block_number,
            block_hash,
            deposit_root,
            staking_module_id,
            nonce,
        );
        DepositMessage {
            block_number,
            block_hash,
            deposit_root,
            staking_module_id,
            nonce,
            guardian: self.address(),
            signature: self.sign_digest(digest),
        }
    }

    pub fn signed_pause(
        &self,
        prefixes: &MessagePrefixes,
        block_number: BlockNumber,
        block_hash: B256,
        staking_module_id: Option<u64>,
    ) -> PauseMessage {
        let digest = pause_digest(prefixes.pause, block_number, staking_module_id);
        PauseMessage {
            block_number,
            block_hash: Some(block_hash),
            staking_module_id,
            guardian: self.address(),
            signature: self.sign_digest(digest),
        }
    }

    pub fn signed_unvet(
        &self,
        prefixes: &MessagePrefixes,
        block_number: BlockNumber,
        block_hash: B256,
        staking_module_id: u64,
        nonce: u64,
        operator_ids: Vec<u8>,
        vetted_keys_by_operator: Vec<u8>,
    ) -> UnvetMessage {
        let digest = unvet_digest(
            prefixes.unvet,
            block_number,
            block_hash,
            staking_module_id,
            nonce,
            &operator_ids,
            &vetted_keys_by_operator,
        );
        UnvetMessage {
            block_number,
            block_hash,
            staking_module_id,
            nonce,
            operator_ids,
            vetted_keys_by_operator,
            guardian: self.address(),
            signature: self.sign_digest(digest),
        }
    }
}

/// Fixed prefixes for tests; production reads them from the security contract.
pub fn test_prefixes() -> MessagePrefixes {
    MessagePrefixes {
        deposit: B256::repeat_byte(0x01),
        pause: B256::repeat_byte(0x02),
        unvet: B256::repeat_byte(0x03),
    }
}
