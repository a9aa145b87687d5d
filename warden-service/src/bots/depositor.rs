//! The depositor bot.
//!
//! Per cycle: ingest fresh guardian messages, actualize the deposit backlog
//! against current chain state, then walk the depositable modules in
//! priority order; for each one form a quorum, pass the deposit gate, and
//! submit the deposit with relay preference. Modules backed by a capital
//! vault get a direct-deposit transaction tried first, falling back to the
//! standard path. Ping messages feed the liveness gauge only.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use alloy_primitives::Address;
use warden_core::application::strategy::gate::DepositGate;
use warden_core::application::{Executor, TransactionSender};
use warden_core::domain::message::{DepositMessage, GuardianMessage, MessageKind};
use warden_core::domain::quorum::form_quorum;
use warden_core::domain::signing::MessagePrefixes;
use warden_core::domain::validation::{is_deposit_actual, is_ping_actual, DepositContext};
use warden_core::foundation::error::{Result, WardenError};
use warden_core::foundation::types::Wei;
use warden_core::infrastructure::chain::{
    BlockHeader, DepositVault, ModuleVault, SecurityContract, StakingPool, StakingRouter,
    TxRequest,
};
use warden_core::infrastructure::config::ModulesConfig;
use warden_core::infrastructure::transport::storage::MessageStore;

use crate::metrics::Metrics;

pub struct DepositorBot {
    security: Arc<dyn SecurityContract>,
    router: Arc<dyn StakingRouter>,
    vault: Arc<dyn DepositVault>,
    pool: Arc<dyn StakingPool>,
    gate: DepositGate,
    sender: Arc<TransactionSender>,
    store: Mutex<MessageStore>,
    prefixes: MessagePrefixes,
    whitelist: Vec<u64>,
    module_vaults: HashMap<u64, Arc<dyn ModuleVault>>,
    direct_deposit_threshold: Wei,
    module_cooldown: Duration,
    module_failed_at: std::sync::Mutex<HashMap<u64, Instant>>,
    metrics: Arc<Metrics>,
}

impl DepositorBot {
    /// Fetches the message prefixes once; they are immutable per contract
    /// version.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        security: Arc<dyn SecurityContract>,
        router: Arc<dyn StakingRouter>,
        vault: Arc<dyn DepositVault>,
        pool: Arc<dyn StakingPool>,
        gate: DepositGate,
        sender: Arc<TransactionSender>,
        store: MessageStore,
        module_vaults: Vec<Arc<dyn ModuleVault>>,
        modules: &ModulesConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let prefixes = security.message_prefixes().await?;
        let module_vaults =
            module_vaults.into_iter().map(|v| (v.module_id(), v)).collect();
        Ok(DepositorBot {
            security,
            router,
            vault,
            pool,
            gate,
            sender,
            store: Mutex::new(store),
            prefixes,
            whitelist: modules.whitelist.clone(),
            module_vaults,
            direct_deposit_threshold: modules.direct_deposit_threshold,
            module_cooldown: Duration::from_secs(modules.failed_module_cooldown_secs),
            module_failed_at: std::sync::Mutex::new(HashMap::new()),
            metrics,
        })
    }

    /// Runs under the executor until a fatal error.
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
        let threshold = NonZeroUsize::new(self.security.quorum_threshold().await?)
            .ok_or(WardenError::QuorumThresholdZero)?;
        let deposit_root = self.vault.deposit_root().await?;

        self.observe_pings(&mut store, &header, &guardians);

        let mut deposited = false;
        for module_id in self.depositable_modules().await? {
            match self
                .process_module(&mut store, &header, module_id, &guardians, threshold, deposit_root)
                .await
            {
                Ok(true) => deposited = true,
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("module cycle failed module_id={module_id} error={e}");
                    self.record_module_failure(module_id);
                    self.metrics.inc_cycle("depositor", "failed");
                }
            }
        }
        self.metrics
            .inc_cycle("depositor", if deposited { "deposited" } else { "idle" });
        Ok(deposited)
    }

    /// Whitelisted modules that are active, accepting deposits and out of
    /// cooldown, ordered by ascending validator gap so underallocated
    /// modules deposit first.
    async fn depositable_modules(&self) -> Result<Vec<u64>> {
        let mut candidates: Vec<(u64, u64)> = Vec::with_capacity(self.whitelist.len());
        for module_id in &self.whitelist {
            let module_id = *module_id;
            if self.module_in_cooldown(module_id) {
                debug!("module cooling down after failure module_id={module_id}");
                continue;
            }
            if !self.router.is_module_active(module_id).await? {
                debug!("module inactive module_id={module_id}");
                continue;
            }
            if !self.security.can_deposit(module_id).await? {
                debug!("deposits not allowed module_id={module_id}");
                continue;
            }
            candidates.push((self.router.validator_gap(module_id).await?, module_id));
        }
        candidates.sort_unstable();
        Ok(candidates.into_iter().map(|(_, module_id)| module_id).collect())
    }

    fn module_in_cooldown(&self, module_id: u64) -> bool {
        match self.module_failed_at.lock() {
            Ok(failed_at) => failed_at
                .get(&module_id)
                .is_some_and(|instant| instant.elapsed() < self.module_cooldown),
            Err(_) => false,
        }
    }

    fn record_module_failure(&self, module_id: u64) {
        if let Ok(mut failed_at) = self.module_failed_at.lock() {
            failed_at.insert(module_id, Instant::now());
        }
    }

    fn observe_pings(&self, store: &mut MessageStore, header: &BlockHeader, guardians: &[Address]) {
        let pings = store.actualize(MessageKind::Ping, |msg| match msg {
            GuardianMessage::Ping(ping) => is_ping_actual(ping, header.number, guardians),
            _ => true,
        });
        let mut alive: Vec<Address> = pings.iter().map(|msg| msg.guardian()).collect();
        alive.sort_unstable();
        alive.dedup();
        self.metrics.set_live_guardians(alive.len());
    }

    async fn process_module(
        &self,
        store: &mut MessageStore,
        header: &BlockHeader,
        module_id: u64,
        guardians: &[Address],
        threshold: NonZeroUsize,
        deposit_root: alloy_primitives::B256,
    ) -> Result<bool> {
        let module_nonce = self.router.module_nonce(module_id).await?;
        let ctx = DepositContext { head_block: header.number, deposit_root, module_nonce };

        // Actualization only judges this module's messages; other modules
        // keep their backlog untouched until their own pass.
        let kept = store.actualize(MessageKind::Deposit, |msg| match msg {
            GuardianMessage::Deposit(deposit) if deposit.staking_module_id == module_id => {
                is_deposit_actual(deposit, &ctx, guardians)
            }
            _ => true,
        });
        let module_messages: Vec<DepositMessage> = kept
            .into_iter()
            .filter_map(|msg| match msg {
                GuardianMessage::Deposit(deposit)
                    if deposit.staking_module_id == module_id =>
                {
                    Some(deposit)
                }
                _ => None,
            })
            .collect();
        self.metrics.observe_messages("deposit", module_messages.len());

        let quorum = form_quorum(&module_messages, threshold);
        if !quorum.ready {
            debug!(
                "no quorum module_id={} best_group={} threshold={}",
                module_id, quorum.best_group_size, threshold
            );
            return Ok(false);
        }

        let assessment = self.gate.assess(module_id).await?;
        if !assessment.approved {
            info!(
                "deposit gated module_id={} keys={} reason={}",
                module_id, assessment.keys, assessment.reason
            );
            return Ok(false);
        }

        // The quorum shares a (block, hash) view; the submitted root and
        // nonce must also match across the signatures we aggregate.
        let first = quorum.messages[0];
        let mut agreeing: Vec<&DepositMessage> = quorum
            .messages
            .iter()
            .copied()
            .filter(|msg| msg.deposit_root == first.deposit_root && msg.nonce == first.nonce)
            .collect();
        if agreeing.len() < threshold.get() {
            debug!("quorum split on root or nonce module_id={module_id}");
            return Ok(false);
        }
        agreeing.sort_by_key(|msg| msg.guardian);
        let signatures: Vec<_> = agreeing.iter().map(|msg| msg.signature).collect();

        // Deposit paths in preference order, first success wins.
        let mut paths: Vec<(&'static str, TxRequest)> = Vec::with_capacity(2);
        if let Some(vault) = self.module_vaults.get(&module_id) {
            if self.direct_deposit_ready(vault.as_ref()).await? {
                paths.push((
                    "direct",
                    vault.direct_deposit_tx(
                        first.block_number,
                        first.block_hash,
                        first.deposit_root,
                        first.nonce,
                        &signatures,
                    ),
                ));
            }
        }
        paths.push((
            "standard",
            self.security.deposit_tx(
                first.block_number,
                first.block_hash,
                first.deposit_root,
                module_id,
                first.nonce,
                &signatures,
            ),
        ));

        for (path, tx) in paths {
            if !self.sender.verify(&tx).await {
                warn!("deposit transaction fails simulation module_id={module_id} path={path}");
                continue;
            }
            info!(
                "submitting deposit module_id={} path={} block={} nonce={} signatures={}",
                module_id,
                path,
                first.block_number,
                first.nonce,
                signatures.len()
            );
            if self.sender.send(&tx, true).await? {
                self.metrics.inc_action("deposit");
                return Ok(true);
            }
            warn!("deposit not included module_id={module_id} path={path}");
        }
        Ok(false)
    }

    /// Direct-deposit preconditions: the vault holds enough to matter and
    /// the buffer covers the pending withdrawal queue.
    async fn direct_deposit_ready(&self, vault: &dyn ModuleVault) -> Result<bool> {
        if vault.balance().await? < self.direct_deposit_threshold {
            debug!("vault below direct-deposit threshold module_id={}", vault.module_id());
            return Ok(false);
        }
        let buffered = self.pool.buffered_ether().await?;
        let unfinalized = self.pool.unfinalized_withdrawals().await?;
        if buffered < unfinalized {
            debug!(
                "buffer behind withdrawals buffered={buffered} unfinalized={unfinalized} module_id={}",
                vault.module_id()
            );
            return Ok(false);
        }
        Ok(true)
    }
}
