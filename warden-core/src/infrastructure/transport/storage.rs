//! In-memory message store.
//!
//! Merges every configured transport, admits only messages whose guardian
//! signature verifies, and hands each consumer the surviving messages of a
//! kind after a destructive actualization pass.

use std::collections::HashMap;

use futures_util::future::join_all;
use log::{debug, warn};

use crate::domain::message::{GuardianMessage, MessageKind};
use crate::domain::signing::{verify_message, MessagePrefixes};
use crate::infrastructure::transport::MessageProvider;

pub struct MessageStore {
    providers: Vec<std::sync::Arc<dyn MessageProvider>>,
    messages: HashMap<MessageKind, Vec<GuardianMessage>>,
}

impl MessageStore {
    pub fn new(providers: Vec<std::sync::Arc<dyn MessageProvider>>) -> Self {
        MessageStore { providers, messages: HashMap::new() }
    }

    /// Pulls every transport once and admits signature-valid messages.
    ///
    /// Invalid signatures are logged and dropped here, so nothing downstream
    /// ever sees an unverified message.
    pub async fn update(&mut self, prefixes: &MessagePrefixes) {
        let batches = join_all(self.providers.iter().map(|p| p.fetch_messages())).await;
        for (provider, batch) in self.providers.iter().zip(batches) {
            let mut admitted = 0usize;
            for msg in batch {
                match verify_message(prefixes, &msg) {
                    Ok(()) => {
                        self.messages.entry(msg.kind()).or_default().push(msg);
                        admitted += 1;
                    }
                    Err(e) => warn!(
                        "rejecting message transport={} kind={} guardian={} error={}",
                        provider.name(),
                        msg.kind().as_str(),
                        msg.guardian(),
                        e
                    ),
                }
            }
            if admitted > 0 {
                debug!("admitted messages transport={} count={}", provider.name(), admitted);
            }
        }
    }

    /// Retains only messages passing `keep` and returns a snapshot of the
    /// survivors. Dropped messages are gone for good; staleness and consumed
    /// nonces never come back.
    pub fn actualize<F>(&mut self, kind: MessageKind, keep: F) -> Vec<GuardianMessage>
    where
        F: Fn(&GuardianMessage) -> bool,
    {
        let entries = self.messages.entry(kind).or_default();
        entries.retain(|msg| keep(msg));
        entries.clone()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages.get(&kind).map_or(0, Vec::len)
    }
}
