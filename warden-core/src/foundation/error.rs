use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SignatureInvalid,
    InvalidVByte,
    MalformedMessage,
    UnsupportedMessage,
    QuorumThresholdZero,
    EncodingError,
    SerializationError,
    CryptoError,
    TransportError,
    RpcError,
    BlockNotFound,
    NoActiveEndpoint,
    CallReverted,
    TransactionTimeout,
    RelayError,
    CycleTimeout,
    WaitForBlockTimeout,
    ConfigError,
    ModuleNotSupported,
    Message,
}

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("signature does not recover to claimed guardian {claimed}")]
    SignatureInvalid { claimed: String },

    #[error("signature has invalid v byte: {0}")]
    InvalidVByte(u64),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unsupported message schema: {0}")]
    UnsupportedMessage(String),

    #[error("guardian quorum threshold must be at least 1")]
    QuorumThresholdZero,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("node RPC error: {0}")]
    RpcError(String),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("no active RPC endpoint: {0}")]
    NoActiveEndpoint(String),

    #[error("local call reverted: {0}")]
    CallReverted(String),

    #[error("transaction not included within {timeout_blocks} blocks")]
    TransactionTimeout { timeout_blocks: u64 },

    #[error("private relay error: {0}")]
    RelayError(String),

    #[error("cycle exceeded max lifetime of {max_lifetime_secs}s")]
    CycleTimeout { max_lifetime_secs: u64 },

    #[error("no new block after waiting {waited_secs}s")]
    WaitForBlockTimeout { waited_secs: u64 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("staking module {0} is not supported by any strategy")]
    ModuleNotSupported(u64),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, WardenError>;

impl WardenError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WardenError::SignatureInvalid { .. } => ErrorCode::SignatureInvalid,
            WardenError::InvalidVByte(_) => ErrorCode::InvalidVByte,
            WardenError::MalformedMessage(_) => ErrorCode::MalformedMessage,
            WardenError::UnsupportedMessage(_) => ErrorCode::UnsupportedMessage,
            WardenError::QuorumThresholdZero => ErrorCode::QuorumThresholdZero,
            WardenError::EncodingError(_) => ErrorCode::EncodingError,
            WardenError::SerializationError { .. } => ErrorCode::SerializationError,
            WardenError::CryptoError { .. } => ErrorCode::CryptoError,
            WardenError::TransportError { .. } => ErrorCode::TransportError,
            WardenError::RpcError(_) => ErrorCode::RpcError,
            WardenError::BlockNotFound(_) => ErrorCode::BlockNotFound,
            WardenError::NoActiveEndpoint(_) => ErrorCode::NoActiveEndpoint,
            WardenError::CallReverted(_) => ErrorCode::CallReverted,
            WardenError::TransactionTimeout { .. } => ErrorCode::TransactionTimeout,
            WardenError::RelayError(_) => ErrorCode::RelayError,
            WardenError::CycleTimeout { .. } => ErrorCode::CycleTimeout,
            WardenError::WaitForBlockTimeout { .. } => ErrorCode::WaitForBlockTimeout,
            WardenError::ConfigError(_) => ErrorCode::ConfigError,
            WardenError::ModuleNotSupported(_) => ErrorCode::ModuleNotSupported,
            WardenError::Message(_) => ErrorCode::Message,
        }
    }

    /// Errors that must terminate the process instead of the current tick.
    ///
    /// Recovery for these is an external restart; no in-process state is
    /// trusted after they fire.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WardenError::NoActiveEndpoint(_)
                | WardenError::CycleTimeout { .. }
                | WardenError::WaitForBlockTimeout { .. }
        )
    }

    /// Errors expected to clear on their own within a block or two.
    pub fn is_transient(&self) -> bool {
        matches!(self, WardenError::BlockNotFound(_) | WardenError::RpcError(_))
    }
}

impl From<hex::FromHexError> for WardenError {
    fn from(err: hex::FromHexError) -> Self {
        WardenError::EncodingError(format!("hex decode error: {err}"))
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        WardenError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<secp256k1::Error> for WardenError {
    fn from(err: secp256k1::Error) -> Self {
        WardenError::CryptoError { operation: "secp256k1".to_string(), details: err.to_string() }
    }
}

impl From<alloy_dyn_abi::Error> for WardenError {
    fn from(err: alloy_dyn_abi::Error) -> Self {
        WardenError::EncodingError(format!("abi decode error: {err}"))
    }
}

impl From<figment::Error> for WardenError {
    fn from(err: figment::Error) -> Self {
        WardenError::ConfigError(err.to_string())
    }
}

impl From<io::Error> for WardenError {
    fn from(err: io::Error) -> Self {
        WardenError::ConfigError(err.to_string())
    }
}
