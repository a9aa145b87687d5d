//! Push-stream transport.
//!
//! Wraps a boxed stream of JSON envelopes, as produced by an external
//! subscriber (a websocket feed, a queue consumer). The fetch drains only
//! what is already buffered: each poll is bounded by a short grace timeout
//! so a quiet stream never stalls a tick.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::warn;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::message::GuardianMessage;
use crate::foundation::constants::MAX_MESSAGES_PER_FETCH;
use crate::infrastructure::transport::wire::parse_envelope;
use crate::infrastructure::transport::MessageProvider;

const POLL_GRACE: Duration = Duration::from_millis(50);

pub struct PushProvider {
    name: String,
    stream: Mutex<BoxStream<'static, Value>>,
    // Sync as well as Send: the provider is shared across tick tasks.
    _keepalive: Option<Box<dyn std::any::Any + Send + Sync>>,
}

impl PushProvider {
    pub fn new(name: impl Into<String>, stream: BoxStream<'static, Value>) -> Self {
        PushProvider { name: name.into(), stream: Mutex::new(stream), _keepalive: None }
    }

    /// Like [`PushProvider::new`], additionally owning whatever keeps the
    /// upstream subscription alive.
    pub fn new_with_keepalive(
        name: impl Into<String>,
        stream: BoxStream<'static, Value>,
        keepalive: Box<dyn std::any::Any + Send + Sync>,
    ) -> Self {
        PushProvider { name: name.into(), stream: Mutex::new(stream), _keepalive: Some(keepalive) }
    }
}

#[async_trait]
impl MessageProvider for PushProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_messages(&self) -> Vec<GuardianMessage> {
        let mut stream = self.stream.lock().await;
        let mut messages = Vec::new();
        while messages.len() < MAX_MESSAGES_PER_FETCH {
            let value = match tokio::time::timeout(POLL_GRACE, stream.next()).await {
                Ok(Some(value)) => value,
                // Stream ended or nothing buffered right now.
                Ok(None) | Err(_) => break,
            };
            match parse_envelope(&value) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("dropping bad envelope transport={} error={}", self.name, e),
            }
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::json;

    fn ping(block_number: u64) -> Value {
        json!({
            "type": "ping",
            "blockNumber": block_number,
            "guardianAddress": format!("0x{}", hex::encode([0x22u8; 20])),
        })
    }

    #[tokio::test]
    async fn drains_buffered_items_then_stops() {
        let items = vec![ping(1), ping(2), ping(3)];
        let provider = PushProvider::new("test-push", stream::iter(items).boxed());

        let messages = provider.fetch_messages().await;
        assert_eq!(messages.len(), 3);
        assert!(provider.fetch_messages().await.is_empty());
    }

    #[tokio::test]
    async fn keepalive_provider_is_shareable_across_tasks() {
        let (keepalive, _rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let provider = std::sync::Arc::new(PushProvider::new_with_keepalive(
            "test-push",
            stream::iter(vec![ping(1)]).boxed(),
            Box::new(keepalive),
        ));
        // Spawning forces the fetch future (and the provider) to be Send.
        let handle = tokio::spawn({
            let provider = provider.clone();
            async move { provider.fetch_messages().await }
        });
        assert_eq!(handle.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_stream_does_not_stall_fetch() {
        let provider = PushProvider::new("test-push", stream::pending().boxed());
        let messages = tokio::time::timeout(Duration::from_secs(1), provider.fetch_messages())
            .await
            .unwrap();
        assert!(messages.is_empty());
    }
}
