//! In-process channel transport.
//!
//! Anything that can hand us JSON envelopes through an unbounded channel
//! becomes a message source: an external consumer task, a test, a sidecar.

use std::sync::Mutex;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::message::GuardianMessage;
use crate::foundation::constants::MAX_MESSAGES_PER_FETCH;
use crate::infrastructure::transport::wire::parse_envelope;
use crate::infrastructure::transport::MessageProvider;

pub struct BusProvider {
    name: String,
    receiver: Mutex<mpsc::UnboundedReceiver<Value>>,
}

impl BusProvider {
    pub fn new(name: impl Into<String>, receiver: mpsc::UnboundedReceiver<Value>) -> Self {
        BusProvider { name: name.into(), receiver: Mutex::new(receiver) }
    }

    /// Builds a provider together with the sending half of its channel.
    pub fn channel(name: impl Into<String>) -> (mpsc::UnboundedSender<Value>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, BusProvider::new(name, receiver))
    }
}

#[async_trait]
impl MessageProvider for BusProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_messages(&self) -> Vec<GuardianMessage> {
        let mut receiver = match self.receiver.lock() {
            Ok(receiver) => receiver,
            Err(_) => {
                warn!("channel lock poisoned transport={}", self.name);
                return Vec::new();
            }
        };
        let mut messages = Vec::new();
        while messages.len() < MAX_MESSAGES_PER_FETCH {
            match receiver.try_recv() {
                Ok(value) => match parse_envelope(&value) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => warn!("dropping bad envelope transport={} error={}", self.name, e),
                },
                Err(_) => break,
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ping(block_number: u64) -> Value {
        json!({
            "type": "ping",
            "blockNumber": block_number,
            "guardianAddress": format!("0x{}", hex::encode([0x11u8; 20])),
        })
    }

    #[tokio::test]
    async fn drains_pending_envelopes() {
        let (sender, provider) = BusProvider::channel("test-bus");
        sender.send(ping(1)).unwrap();
        sender.send(ping(2)).unwrap();

        let messages = provider.fetch_messages().await;
        assert_eq!(messages.len(), 2);
        assert!(provider.fetch_messages().await.is_empty());
    }

    #[tokio::test]
    async fn bad_envelopes_are_skipped_not_fatal() {
        let (sender, provider) = BusProvider::channel("test-bus");
        sender.send(json!({"type": "nonsense"})).unwrap();
        sender.send(ping(3)).unwrap();

        let messages = provider.fetch_messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].block_number(), 3);
    }
}
