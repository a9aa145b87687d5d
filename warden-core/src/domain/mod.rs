pub mod message;
pub mod quorum;
pub mod signing;
pub mod validation;

pub use message::{
    DepositMessage, GuardianMessage, GuardianSignature, MessageKind, PauseMessage, PingMessage,
    UnvetMessage,
};
pub use quorum::{form_quorum, QuorumMember, QuorumOutcome};
pub use signing::MessagePrefixes;
