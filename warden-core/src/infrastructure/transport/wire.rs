//! JSON envelope parsing for channel-based transports.
//!
//! Guardians publish camelCase JSON with a `type` discriminant. Signatures
//! arrive either split as `{v, r, s}` or pre-folded as `{r, vs}`; both forms
//! normalize to [`GuardianSignature`].

use alloy_primitives::{Address, B256};
use serde_json::Value;

use crate::domain::message::{
    DepositMessage, GuardianMessage, GuardianSignature, PauseMessage, PingMessage, UnvetMessage,
};
use crate::foundation::error::{Result, WardenError};
use crate::foundation::util::{parse_address, parse_hex_32, parse_hex_bytes};

fn malformed(field: &str) -> WardenError {
    WardenError::MalformedMessage(format!("missing or invalid field: {field}"))
}

fn field_u64(value: &Value, field: &str) -> Result<u64> {
    value.get(field).and_then(Value::as_u64).ok_or_else(|| malformed(field))
}

fn field_b256(value: &Value, field: &str) -> Result<B256> {
    let raw = value.get(field).and_then(Value::as_str).ok_or_else(|| malformed(field))?;
    parse_hex_32(raw).map_err(|_| malformed(field))
}

fn field_address(value: &Value, field: &str) -> Result<Address> {
    let raw = value.get(field).and_then(Value::as_str).ok_or_else(|| malformed(field))?;
    parse_address(raw).map_err(|_| malformed(field))
}

fn field_bytes(value: &Value, field: &str) -> Result<Vec<u8>> {
    let raw = value.get(field).and_then(Value::as_str).ok_or_else(|| malformed(field))?;
    parse_hex_bytes(raw).map_err(|_| malformed(field))
}

fn field_signature(value: &Value) -> Result<GuardianSignature> {
    let sig = value.get("signature").ok_or_else(|| malformed("signature"))?;
    let r = field_b256(sig, "r")?;
    // Pre-folded form takes precedence when both are present.
    for folded in ["vs", "_vs"] {
        if sig.get(folded).is_some() {
            let vs = field_b256(sig, folded)?;
            return Ok(GuardianSignature { r, vs });
        }
    }
    let v = field_u64(sig, "v")?;
    let s = field_b256(sig, "s")?;
    GuardianSignature::from_vrs(v, r, s)
}

/// Parses one JSON envelope into a schema-valid message.
pub fn parse_envelope(value: &Value) -> Result<GuardianMessage> {
    let kind = value.get("type").and_then(Value::as_str).ok_or_else(|| malformed("type"))?;
    match kind {
        "deposit" => Ok(GuardianMessage::Deposit(DepositMessage {
            block_number: field_u64(value, "blockNumber")?,
            block_hash: field_b256(value, "blockHash")?,
            deposit_root: field_b256(value, "depositRoot")?,
            staking_module_id: field_u64(value, "stakingModuleId")?,
            nonce: field_u64(value, "nonce")?,
            guardian: field_address(value, "guardianAddress")?,
            signature: field_signature(value)?,
        })),
        "pause" => Ok(GuardianMessage::Pause(PauseMessage {
            block_number: field_u64(value, "blockNumber")?,
            block_hash: match value.get("blockHash") {
                None | Some(Value::Null) => None,
                Some(_) => Some(field_b256(value, "blockHash")?),
            },
            staking_module_id: value
                .get("stakingModuleId")
                .map(|v| v.as_u64().ok_or_else(|| malformed("stakingModuleId")))
                .transpose()?,
            guardian: field_address(value, "guardianAddress")?,
            signature: field_signature(value)?,
        })),
        "unvet" => Ok(GuardianMessage::Unvet(UnvetMessage {
            block_number: field_u64(value, "blockNumber")?,
            block_hash: field_b256(value, "blockHash")?,
            staking_module_id: field_u64(value, "stakingModuleId")?,
            nonce: field_u64(value, "nonce")?,
            operator_ids: field_bytes(value, "operatorIds")?,
            vetted_keys_by_operator: field_bytes(value, "vettedKeysByOperator")?,
            guardian: field_address(value, "guardianAddress")?,
            signature: field_signature(value)?,
        })),
        "ping" => Ok(GuardianMessage::Ping(PingMessage {
            block_number: field_u64(value, "blockNumber")?,
            guardian: field_address(value, "guardianAddress")?,
        })),
        other => Err(WardenError::UnsupportedMessage(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hex32(byte: u8) -> String {
        format!("0x{}", hex::encode([byte; 32]))
    }

    fn deposit_json() -> Value {
        json!({
            "type": "deposit",
            "blockNumber": 100,
            "blockHash": hex32(0xaa),
            "depositRoot": hex32(0xdd),
            "stakingModuleId": 1,
            "nonce": 5,
            "guardianAddress": format!("0x{}", hex::encode([0x11u8; 20])),
            "signature": {"v": 27, "r": hex32(0x01), "s": hex32(0x02)},
        })
    }

    #[test]
    fn parses_deposit_with_split_signature() {
        let msg = parse_envelope(&deposit_json()).unwrap();
        let GuardianMessage::Deposit(deposit) = msg else { panic!("wrong kind") };
        assert_eq!(deposit.block_number, 100);
        assert_eq!(deposit.nonce, 5);
        assert_eq!(deposit.signature.vs, B256::repeat_byte(0x02));
    }

    #[test]
    fn parses_folded_signature() {
        let mut value = deposit_json();
        value["signature"] = json!({"r": hex32(0x01), "_vs": hex32(0x82)});
        let msg = parse_envelope(&value).unwrap();
        let GuardianMessage::Deposit(deposit) = msg else { panic!("wrong kind") };
        assert_eq!(deposit.signature.vs.0[0], 0x82);
    }

    #[test]
    fn pause_module_id_is_optional() {
        let value = json!({
            "type": "pause",
            "blockNumber": 100,
            "blockHash": hex32(0xaa),
            "guardianAddress": format!("0x{}", hex::encode([0x11u8; 20])),
            "signature": {"v": 28, "r": hex32(0x01), "s": hex32(0x02)},
        });
        let msg = parse_envelope(&value).unwrap();
        let GuardianMessage::Pause(pause) = msg else { panic!("wrong kind") };
        assert_eq!(pause.staking_module_id, None);
    }

    #[test]
    fn pause_block_hash_is_optional() {
        let value = json!({
            "type": "pause",
            "blockNumber": 100,
            "guardianAddress": format!("0x{}", hex::encode([0x11u8; 20])),
            "signature": {"v": 28, "r": hex32(0x01), "s": hex32(0x02)},
        });
        let msg = parse_envelope(&value).unwrap();
        let GuardianMessage::Pause(pause) = msg else { panic!("wrong kind") };
        assert_eq!(pause.block_hash, None);

        let mut with_hash = value.clone();
        with_hash["blockHash"] = json!(hex32(0xaa));
        let GuardianMessage::Pause(pause) = parse_envelope(&with_hash).unwrap() else {
            panic!("wrong kind")
        };
        assert_eq!(pause.block_hash, Some(B256::repeat_byte(0xaa)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let value = json!({"type": "exit", "blockNumber": 1});
        assert!(matches!(parse_envelope(&value), Err(WardenError::UnsupportedMessage(_))));
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut value = deposit_json();
        value.as_object_mut().unwrap().remove("depositRoot");
        assert!(matches!(parse_envelope(&value), Err(WardenError::MalformedMessage(_))));
    }

    #[test]
    fn bad_hex_is_rejected() {
        let mut value = deposit_json();
        value["blockHash"] = json!("0x1234");
        assert!(parse_envelope(&value).is_err());
    }
}
