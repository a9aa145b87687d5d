//! On-chain data bus transport.
//!
//! Guardians also mirror their messages into a data-bus contract as events.
//! The scanner tails those logs: each fetch covers at most
//! [`STANDARD_LOG_OFFSET`] blocks behind the head and resumes from a cursor
//! that only advances when a scan actually returned logs, so an empty range
//! is retried rather than skipped past.

use std::sync::{Arc, Mutex};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use log::{debug, warn};

use crate::domain::message::{
    DepositMessage, GuardianMessage, GuardianSignature, PauseMessage, PingMessage, UnvetMessage,
};
use crate::foundation::constants::STANDARD_LOG_OFFSET;
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::BlockNumber;
use crate::infrastructure::chain::{ChainReader, LogEntry};
use crate::infrastructure::transport::MessageProvider;

const DEPOSIT_EVENT: &str =
    "MessageDepositV1(address,(uint256,bytes32,bytes32,uint256,uint256,(bytes32,bytes32),(bytes32)))";
const PAUSE_V2_EVENT: &str =
    "MessagePauseV2(address,(uint256,bytes32,(bytes32,bytes32),uint256,(bytes32)))";
const PAUSE_V3_EVENT: &str = "MessagePauseV3(address,(uint256,bytes32,(bytes32,bytes32),(bytes32)))";
const UNVET_EVENT: &str =
    "MessageUnvetV1(address,(uint256,bytes32,uint256,uint256,bytes,bytes,(bytes32,bytes32),(bytes32)))";
const PING_EVENT: &str = "MessagePingV1(address,(uint256,(bytes32)))";

const DEPOSIT_DATA: &str = "(uint256,bytes32,bytes32,uint256,uint256,(bytes32,bytes32),(bytes32))";
const PAUSE_V2_DATA: &str = "(uint256,bytes32,(bytes32,bytes32),uint256,(bytes32))";
const PAUSE_V3_DATA: &str = "(uint256,bytes32,(bytes32,bytes32),(bytes32))";
const UNVET_DATA: &str = "(uint256,bytes32,uint256,uint256,bytes,bytes,(bytes32,bytes32),(bytes32))";
const PING_DATA: &str = "(uint256,(bytes32))";

#[derive(Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Deposit,
    PauseV2,
    PauseV3,
    Unvet,
    Ping,
}

struct EventSchema {
    topic0: B256,
    kind: EventKind,
    data: DynSolType,
}

pub struct OnchainScanner {
    name: String,
    reader: Arc<dyn ChainReader>,
    bus_address: Address,
    schemas: Vec<EventSchema>,
    topics: Vec<B256>,
    last_scanned: Mutex<Option<BlockNumber>>,
}

impl OnchainScanner {
    pub fn new(reader: Arc<dyn ChainReader>, bus_address: Address) -> Result<Self> {
        let specs = [
            (DEPOSIT_EVENT, DEPOSIT_DATA, EventKind::Deposit),
            (PAUSE_V2_EVENT, PAUSE_V2_DATA, EventKind::PauseV2),
            (PAUSE_V3_EVENT, PAUSE_V3_DATA, EventKind::PauseV3),
            (UNVET_EVENT, UNVET_DATA, EventKind::Unvet),
            (PING_EVENT, PING_DATA, EventKind::Ping),
        ];
        let mut schemas = Vec::with_capacity(specs.len());
        for (signature, data, kind) in specs {
            schemas.push(EventSchema {
                topic0: keccak256(signature.as_bytes()),
                kind,
                data: data.parse::<DynSolType>()?,
            });
        }
        let topics = schemas.iter().map(|s| s.topic0).collect();
        OnchainScanner::validate_address(bus_address)?;
        Ok(OnchainScanner {
            name: "onchain-bus".to_string(),
            reader,
            bus_address,
            schemas,
            topics,
            last_scanned: Mutex::new(None),
        })
    }

    fn validate_address(address: Address) -> Result<()> {
        if address == Address::ZERO {
            return Err(WardenError::ConfigError(
                "data bus address must not be zero".to_string(),
            ));
        }
        Ok(())
    }

    fn scan_range(&self, head: BlockNumber) -> Option<(BlockNumber, BlockNumber)> {
        let mut from = head.saturating_sub(STANDARD_LOG_OFFSET);
        if let Ok(cursor) = self.last_scanned.lock() {
            if let Some(last) = *cursor {
                from = from.max(last + 1);
            }
        }
        (from <= head).then_some((from, head))
    }

    fn decode_log(&self, entry: &LogEntry) -> Result<GuardianMessage> {
        let topic0 =
            entry.topics.first().ok_or_else(|| malformed("log without topics"))?;
        let schema = self
            .schemas
            .iter()
            .find(|s| s.topic0 == *topic0)
            .ok_or_else(|| WardenError::UnsupportedMessage(format!("topic {topic0}")))?;
        let guardian_topic =
            entry.topics.get(1).ok_or_else(|| malformed("log without guardian topic"))?;
        let guardian = Address::from_slice(&guardian_topic.as_slice()[12..]);

        // Event data is the ABI encoding of the single non-indexed tuple
        // parameter, so decode it as a one-element parameter list.
        let outer = DynSolType::Tuple(vec![schema.data.clone()]);
        let decoded = outer.abi_decode_params(&entry.data)?;
        let fields = match decoded {
            DynSolValue::Tuple(mut items) if items.len() == 1 => match items.remove(0) {
                DynSolValue::Tuple(fields) => fields,
                _ => return Err(malformed("event payload is not a tuple")),
            },
            _ => return Err(malformed("unexpected event data shape")),
        };

        match schema.kind {
            EventKind::Deposit => Ok(GuardianMessage::Deposit(DepositMessage {
                block_number: as_u64(&fields, 0)?,
                block_hash: as_b256(&fields, 1)?,
                deposit_root: as_b256(&fields, 2)?,
                staking_module_id: as_u64(&fields, 3)?,
                nonce: as_u64(&fields, 4)?,
                guardian,
                signature: as_signature(&fields, 5)?,
            })),
            EventKind::PauseV2 => Ok(GuardianMessage::Pause(PauseMessage {
                block_number: as_u64(&fields, 0)?,
                block_hash: Some(as_b256(&fields, 1)?),
                signature: as_signature(&fields, 2)?,
                staking_module_id: Some(as_u64(&fields, 3)?),
                guardian,
            })),
            EventKind::PauseV3 => Ok(GuardianMessage::Pause(PauseMessage {
                block_number: as_u64(&fields, 0)?,
                block_hash: Some(as_b256(&fields, 1)?),
                signature: as_signature(&fields, 2)?,
                staking_module_id: None,
                guardian,
            })),
            EventKind::Unvet => Ok(GuardianMessage::Unvet(UnvetMessage {
                block_number: as_u64(&fields, 0)?,
                block_hash: as_b256(&fields, 1)?,
                staking_module_id: as_u64(&fields, 2)?,
                nonce: as_u64(&fields, 3)?,
                operator_ids: as_bytes(&fields, 4)?,
                vetted_keys_by_operator: as_bytes(&fields, 5)?,
                signature: as_signature(&fields, 6)?,
                guardian,
            })),
            EventKind::Ping => Ok(GuardianMessage::Ping(PingMessage {
                block_number: as_u64(&fields, 0)?,
                guardian,
            })),
        }
    }
}

fn malformed(details: &str) -> WardenError {
    WardenError::MalformedMessage(details.to_string())
}

fn as_u64(fields: &[DynSolValue], index: usize) -> Result<u64> {
    match fields.get(index) {
        Some(DynSolValue::Uint(value, _)) => (*value)
            .try_into()
            .map_err(|_| malformed(&format!("field {index} exceeds u64"))),
        _ => Err(malformed(&format!("field {index} is not a uint"))),
    }
}

fn as_b256(fields: &[DynSolValue], index: usize) -> Result<B256> {
    match fields.get(index) {
        Some(DynSolValue::FixedBytes(word, 32)) => Ok(*word),
        _ => Err(malformed(&format!("field {index} is not bytes32"))),
    }
}

fn as_bytes(fields: &[DynSolValue], index: usize) -> Result<Vec<u8>> {
    match fields.get(index) {
        Some(DynSolValue::Bytes(bytes)) => Ok(bytes.clone()),
        _ => Err(malformed(&format!("field {index} is not bytes"))),
    }
}

fn as_signature(fields: &[DynSolValue], index: usize) -> Result<GuardianSignature> {
    match fields.get(index) {
        Some(DynSolValue::Tuple(parts)) if parts.len() == 2 => {
            let r = match &parts[0] {
                DynSolValue::FixedBytes(word, 32) => *word,
                _ => return Err(malformed("signature r is not bytes32")),
            };
            let vs = match &parts[1] {
                DynSolValue::FixedBytes(word, 32) => *word,
                _ => return Err(malformed("signature vs is not bytes32")),
            };
            Ok(GuardianSignature { r, vs })
        }
        _ => Err(malformed(&format!("field {index} is not a signature tuple"))),
    }
}

#[async_trait]
impl MessageProvider for OnchainScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_messages(&self) -> Vec<GuardianMessage> {
        let head = match self.reader.latest_block().await {
            Ok(header) => header.number,
            Err(e) => {
                warn!("head lookup failed transport={} error={}", self.name, e);
                return Vec::new();
            }
        };
        let Some((from, to)) = self.scan_range(head) else {
            return Vec::new();
        };
        let logs = match self.reader.logs(self.bus_address, &self.topics, from, to).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(
                    "log scan failed transport={} from={} to={} error={}",
                    self.name, from, to, e
                );
                return Vec::new();
            }
        };
        if logs.is_empty() {
            return Vec::new();
        }
        debug!("scanned logs transport={} from={} to={} count={}", self.name, from, to, logs.len());

        let mut messages = Vec::with_capacity(logs.len());
        for entry in &logs {
            match self.decode_log(entry) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(
                    "dropping undecodable log transport={} block={} error={}",
                    self.name, entry.block_number, e
                ),
            }
        }
        if let Ok(mut cursor) = self.last_scanned.lock() {
            *cursor = Some(to);
        }
        messages
    }
}
