//! Packed-hash construction and ECDSA recovery for guardian messages.
//!
//! The digest for each message family is `keccak256` over the tight
//! concatenation of a domain-separating prefix and the message fields, with
//! integers widened to 32 big-endian bytes. Recovery follows the usual
//! `ecrecover` path: uncompressed public key, keccak, last 20 bytes.

use alloy_primitives::{keccak256, Address, B256};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SECP256K1};

use crate::domain::message::{DepositMessage, GuardianSignature, PauseMessage, UnvetMessage};
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::BlockNumber;

/// Domain-separating prefixes, read from the security contract at startup.
/// Each message family hashes under its own prefix so a signature can never
/// be replayed across families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePrefixes {
    pub deposit: B256,
    pub pause: B256,
    pub unvet: B256,
}

fn u256_be(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Digest a deposit message hashes under.
pub fn deposit_digest(
    prefix: B256,
    block_number: BlockNumber,
    block_hash: B256,
    deposit_root: B256,
    staking_module_id: u64,
    nonce: u64,
) -> B256 {
    let mut packed = Vec::with_capacity(32 * 6);
    packed.extend_from_slice(prefix.as_slice());
    packed.extend_from_slice(&u256_be(block_number));
    packed.extend_from_slice(block_hash.as_slice());
    packed.extend_from_slice(deposit_root.as_slice());
    packed.extend_from_slice(&u256_be(staking_module_id));
    packed.extend_from_slice(&u256_be(nonce));
    keccak256(&packed)
}

/// Digest a pause message hashes under. The module id participates only in
/// the module-scoped schema.
pub fn pause_digest(
    prefix: B256,
    block_number: BlockNumber,
    staking_module_id: Option<u64>,
) -> B256 {
    let mut packed = Vec::with_capacity(32 * 3);
    packed.extend_from_slice(prefix.as_slice());
    packed.extend_from_slice(&u256_be(block_number));
    if let Some(module_id) = staking_module_id {
        packed.extend_from_slice(&u256_be(module_id));
    }
    keccak256(&packed)
}

/// Digest an unvet message hashes under. The operator id and vetted-key
/// blobs are packed raw, without length prefixes.
pub fn unvet_digest(
    prefix: B256,
    block_number: BlockNumber,
    block_hash: B256,
    staking_module_id: u64,
    nonce: u64,
    operator_ids: &[u8],
    vetted_keys_by_operator: &[u8],
) -> B256 {
    let mut packed =
        Vec::with_capacity(32 * 5 + operator_ids.len() + vetted_keys_by_operator.len());
    packed.extend_from_slice(prefix.as_slice());
    packed.extend_from_slice(&u256_be(block_number));
    packed.extend_from_slice(block_hash.as_slice());
    packed.extend_from_slice(&u256_be(staking_module_id));
    packed.extend_from_slice(&u256_be(nonce));
    packed.extend_from_slice(operator_ids);
    packed.extend_from_slice(vetted_keys_by_operator);
    keccak256(&packed)
}

/// Recovers the signing address from a digest and compact signature.
pub fn recover_signer(digest: B256, signature: &GuardianSignature) -> Result<Address> {
    let (recid, r, s) = signature.split();
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r.as_slice());
    compact[32..].copy_from_slice(s.as_slice());
    let recid = RecoveryId::from_i32(recid)?;
    let sig = RecoverableSignature::from_compact(&compact, recid)?;
    let msg = Message::from_digest(digest.0);
    let pubkey = SECP256K1.recover_ecdsa(&msg, &sig)?;
    let hashed = keccak256(&pubkey.serialize_uncompressed()[1..]);
    Ok(Address::from_slice(&hashed[12..]))
}

fn check_signer(digest: B256, signature: &GuardianSignature, claimed: Address) -> Result<()> {
    let recovered = recover_signer(digest, signature)?;
    if recovered != claimed {
        return Err(WardenError::SignatureInvalid { claimed: claimed.to_string() });
    }
    Ok(())
}

/// Verifies a deposit message signature against its claimed guardian.
pub fn verify_deposit(prefixes: &MessagePrefixes, msg: &DepositMessage) -> Result<()> {
    let digest = deposit_digest(
        prefixes.deposit,
        msg.block_number,
        msg.block_hash,
        msg.deposit_root,
        msg.staking_module_id,
        msg.nonce,
    );
    check_signer(digest, &msg.signature, msg.guardian)
}

/// Verifies a pause message signature against its claimed guardian.
pub fn verify_pause(prefixes: &MessagePrefixes, msg: &PauseMessage) -> Result<()> {
    let digest = pause_digest(prefixes.pause, msg.block_number, msg.staking_module_id);
    check_signer(digest, &msg.signature, msg.guardian)
}

/// Verifies an unvet message signature against its claimed guardian.
pub fn verify_unvet(prefixes: &MessagePrefixes, msg: &UnvetMessage) -> Result<()> {
    let digest = unvet_digest(
        prefixes.unvet,
        msg.block_number,
        msg.block_hash,
        msg.staking_module_id,
        msg.nonce,
        &msg.operator_ids,
        &msg.vetted_keys_by_operator,
    );
    check_signer(digest, &msg.signature, msg.guardian)
}

/// Dispatches signature verification by message family. Pings carry no
/// signature and always pass.
pub fn verify_message(
    prefixes: &MessagePrefixes,
    msg: &crate::domain::message::GuardianMessage,
) -> Result<()> {
    use crate::domain::message::GuardianMessage;
    match msg {
        GuardianMessage::Deposit(m) => verify_deposit(prefixes, m),
        GuardianMessage::Pause(m) => verify_pause(prefixes, m),
        GuardianMessage::Unvet(m) => verify_unvet(prefixes, m),
        GuardianMessage::Ping(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::GuardianKey;

    #[test]
    fn deposit_digest_is_order_sensitive() {
        let prefix = B256::repeat_byte(0x01);
        let a = deposit_digest(prefix, 1, B256::repeat_byte(2), B256::repeat_byte(3), 4, 5);
        let b = deposit_digest(prefix, 1, B256::repeat_byte(3), B256::repeat_byte(2), 4, 5);
        assert_ne!(a, b);
    }

    #[test]
    fn pause_digest_distinguishes_scoped_and_protocol_wide() {
        let prefix = B256::repeat_byte(0x02);
        assert_ne!(pause_digest(prefix, 10, Some(1)), pause_digest(prefix, 10, None));
    }

    #[test]
    fn recover_signer_round_trip() {
        let key = GuardianKey::from_seed(7);
        let digest = keccak256(b"round trip");
        let sig = key.sign_digest(digest);
        assert_eq!(recover_signer(digest, &sig).unwrap(), key.address());
    }

    #[test]
    fn verify_deposit_rejects_wrong_guardian() {
        let key = GuardianKey::from_seed(7);
        let other = GuardianKey::from_seed(8);
        let prefixes = MessagePrefixes {
            deposit: B256::repeat_byte(0x01),
            pause: B256::repeat_byte(0x02),
            unvet: B256::repeat_byte(0x03),
        };
        let mut msg = key.signed_deposit(&prefixes, 100, B256::repeat_byte(0xaa), B256::repeat_byte(0xbb), 1, 5);
        assert!(verify_deposit(&prefixes, &msg).is_ok());
        msg.guardian = other.address();
        assert!(matches!(
            verify_deposit(&prefixes, &msg),
            Err(WardenError::SignatureInvalid { .. })
        ));
    }

    #[test]
    fn verify_deposit_rejects_tampered_field() {
        let key = GuardianKey::from_seed(9);
        let prefixes = MessagePrefixes {
            deposit: B256::repeat_byte(0x01),
            pause: B256::repeat_byte(0x02),
            unvet: B256::repeat_byte(0x03),
        };
        let mut msg = key.signed_deposit(&prefixes, 100, B256::repeat_byte(0xaa), B256::repeat_byte(0xbb), 1, 5);
        msg.nonce += 1;
        assert!(verify_deposit(&prefixes, &msg).is_err());
    }
}
