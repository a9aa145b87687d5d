//! The unvetter bot.
//!
//! Like pausing, unvetting trusts a single valid guardian message. The
//! message binds to an exact module nonce, so after one submission lands
//! the rest of the backlog goes stale on its own.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use warden_core::application::{Executor, TransactionSender};
use warden_core::domain::message::{GuardianMessage, MessageKind, UnvetMessage};
use warden_core::domain::signing::MessagePrefixes;
use warden_core::domain::validation::{is_fresh, is_known_guardian};
use warden_core::foundation::error::Result;
use warden_core::infrastructure::chain::{BlockHeader, SecurityContract, StakingRouter};
use warden_core::infrastructure::transport::storage::MessageStore;

use crate::metrics::Metrics;

pub struct UnvetterBot {
    security: Arc<dyn SecurityContract>,
    router: Arc<dyn StakingRouter>,
    sender: Arc<TransactionSender>,
    store: Mutex<MessageStore>,
    prefixes: MessagePrefixes,
    metrics: Arc<Metrics>,
}

impl UnvetterBot {
    pub async fn new(
        security: Arc<dyn SecurityContract>,
        router: Arc<dyn StakingRouter>,
        sender: Arc<TransactionSender>,
        store: MessageStore,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let prefixes = security.message_prefixes().await?;
        Ok(UnvetterBot {
            security,
            router,
            sender,
            store: Mutex::new(store),
            prefixes,
            metrics,
        })
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

    pub async fn execute_cycle(&self, header: BlockHeader) -> Result<bool> {
        let mut store = self.store.lock().await;
        store.update(&self.prefixes).await;

        let guardians = self.security.guardians().await?;
        // The nonce check needs a chain read per module, so actualization
        // here only covers freshness and guardian membership.
        let kept = store.actualize(MessageKind::Unvet, |msg| match msg {
            GuardianMessage::Unvet(unvet) => {
                is_known_guardian(unvet.guardian, &guardians)
                    && is_fresh(unvet.block_number, header.number)
            }
            _ => true,
        });
        self.metrics.observe_messages("unvet", kept.len());

        for msg in kept {
            let GuardianMessage::Unvet(unvet) = msg else { continue };
            match self.submit_unvet(&unvet).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("unvet submission failed error={e}"),
            }
        }
        Ok(true)
    }

    async fn submit_unvet(&self, unvet: &UnvetMessage) -> Result<()> {
        if !self.router.is_module_active(unvet.staking_module_id).await? {
            return Ok(());
        }
        let module_nonce = self.router.module_nonce(unvet.staking_module_id).await?;
        if unvet.nonce != module_nonce {
            debug!(
                "skipping unvet with rotated nonce module_id={} message_nonce={} module_nonce={}",
                unvet.staking_module_id, unvet.nonce, module_nonce
            );
            return Ok(());
        }

        let tx = self.security.unvet_tx(unvet);
        if !self.sender.verify(&tx).await {
            warn!(
                "unvet transaction fails simulation module_id={} guardian={}",
                unvet.staking_module_id, unvet.guardian
            );
            return Ok(());
        }

        info!(
            "submitting unvet module_id={} nonce={} guardian={}",
            unvet.staking_module_id, unvet.nonce, unvet.guardian
        );
        if self.sender.send(&tx, false).await? {
            self.metrics.inc_action("unvet");
        }
        Ok(())
    }
}
