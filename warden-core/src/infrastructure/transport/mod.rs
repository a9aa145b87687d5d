//! Message transports.
//!
//! A transport is anything that yields guardian messages: an in-process
//! channel, a push stream from an external subscriber, or the on-chain data
//! bus. All of them normalize through [`wire`] and implement
//! [`MessageProvider`]; the [`storage::MessageStore`] merges them.

pub mod bus;
pub mod onchain;
pub mod push;
pub mod storage;
pub mod wire;

use async_trait::async_trait;

use crate::domain::message::GuardianMessage;

/// A source of guardian messages.
///
/// `fetch_messages` must not block the tick on a quiet transport and must
/// not fail it on a broken one: errors are logged inside the provider and
/// surface as an empty batch.
#[async_trait]
pub trait MessageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Drains everything currently available, schema-validated but not yet
    /// signature-checked.
    async fn fetch_messages(&self) -> Vec<GuardianMessage>;
}
