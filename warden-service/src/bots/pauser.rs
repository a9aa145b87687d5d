//! The pauser bot.
//!
//! A single valid pause message is sufficient: no quorum, no gas gate. The
//! transaction goes straight to the public mempool because hiding a pause
//! in a private relay would only delay it.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::Mutex;

use warden_core::application::{Executor, TransactionSender};
use warden_core::domain::message::{GuardianMessage, MessageKind, PauseMessage};
use warden_core::domain::signing::MessagePrefixes;
use warden_core::domain::validation::is_pause_actual;
use warden_core::foundation::error::Result;
use warden_core::infrastructure::chain::{BlockHeader, SecurityContract};
use warden_core::infrastructure::transport::storage::MessageStore;

use crate::metrics::Metrics;

pub struct PauserBot {
    security: Arc<dyn SecurityContract>,
    sender: Arc<TransactionSender>,
    store: Mutex<MessageStore>,
    prefixes: MessagePrefixes,
    metrics: Arc<Metrics>,
}

impl PauserBot {
    pub async fn new(
        security: Arc<dyn SecurityContract>,
        sender: Arc<TransactionSender>,
        store: MessageStore,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let prefixes = security.message_prefixes().await?;
        Ok(PauserBot { security, sender, store: Mutex::new(store), prefixes, metrics })
    }

    pub async fn run(self: Arc<Self>, executor: Executor) -> Result<()> {
        let bot = self.clone();
        executor
            .run(move |header| {
                let bot = bot.clone();
                async move { bot.execute_cycle(header).await }
            })
            .await
    }

    /// A cycle with nothing to pause is still a successful cycle.
    pub async fn execute_cycle(&self, header: BlockHeader) -> Result<bool> {
        let mut store = self.store.lock().await;
        store.update(&self.prefixes).await;

        let guardians = self.security.guardians().await?;
        let kept = store.actualize(MessageKind::Pause, |msg| match msg {
            GuardianMessage::Pause(pause) => is_pause_actual(pause, header.number, &guardians),
            _ => true,
        });
        self.metrics.observe_messages("pause", kept.len());

        for msg in kept {
            let GuardianMessage::Pause(pause) = msg else { continue };
            match self.submit_pause(&pause).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("pause submission failed error={e}"),
            }
        }
        Ok(true)
    }

    async fn submit_pause(&self, pause: &PauseMessage) -> Result<()> {
        let already_paused = match pause.staking_module_id {
            Some(module_id) => self.security.is_module_paused(module_id).await?,
            None => self.security.is_protocol_paused().await?,
        };
        if already_paused {
            return Ok(());
        }

        let tx = self.security.pause_tx(pause);
        if !self.sender.verify(&tx).await {
            warn!(
                "pause transaction fails simulation scope={:?} guardian={}",
                pause.staking_module_id, pause.guardian
            );
            return Ok(());
        }

        info!(
            "submitting pause scope={:?} block={} guardian={}",
            pause.staking_module_id, pause.block_number, pause.guardian
        );
        if self.sender.send(&tx, false).await? {
            self.metrics.inc_action("pause");
        }
        Ok(())
    }
}
