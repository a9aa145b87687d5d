//! Transaction submission with private-relay preference.
//!
//! Submission walks an ordered list of paths: the private relay first when
//! requested and healthy, then the public mempool. A path succeeds only if
//! the transaction is actually included before the block-denominated
//! timeout; anything else falls through to the next path within the same
//! attempt.
//!
//! Without a signing key the sender runs in dry mode: it prices and logs the
//! transaction, then reports success without broadcasting.

use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::foundation::constants::SLOT_TIME_SECONDS;
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::Wei;
use crate::infrastructure::chain::{
    ChainReader, FeeParams, RelayClient, TxRequest, TxSubmitter,
};
use crate::infrastructure::config::{GasConfig, RelayConfig};

/// How long a relay failure keeps the relay path out of rotation.
const RELAY_COOLDOWN: Duration = Duration::from_secs(300);

/// Headroom multiplier applied to gas estimates, in percent.
const GAS_ESTIMATE_HEADROOM_PERCENT: u64 = 130;

pub struct TransactionSender {
    reader: Arc<dyn ChainReader>,
    submitter: Arc<dyn TxSubmitter>,
    relay: Option<Arc<dyn RelayClient>>,
    gas_config: GasConfig,
    timeout_blocks: u64,
    dry_mode: bool,
    relay_failed_at: Mutex<Option<Instant>>,
}

impl TransactionSender {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        submitter: Arc<dyn TxSubmitter>,
        relay: Option<Arc<dyn RelayClient>>,
        gas_config: GasConfig,
        relay_config: &RelayConfig,
        dry_mode: bool,
    ) -> Self {
        TransactionSender {
            reader,
            submitter,
            relay,
            gas_config,
            timeout_blocks: relay_config.submission_timeout_blocks,
            dry_mode,
            relay_failed_at: Mutex::new(None),
        }
    }

    /// Simulates the transaction. `false` means it would revert right now.
    pub async fn verify(&self, tx: &TxRequest) -> bool {
        match self.submitter.estimate_gas(tx).await {
            Ok(_) => true,
            Err(WardenError::CallReverted(details)) => {
                warn!("transaction would revert details={details}");
                false
            }
            Err(e) => {
                warn!("transaction simulation failed error={e}");
                false
            }
        }
    }

    /// Prices, submits and awaits inclusion. `Ok(true)` means the
    /// transaction landed through some path.
    pub async fn send(&self, tx: &TxRequest, prefer_relay: bool) -> Result<bool> {
        let fees = self.fee_params().await?;
        let gas_limit = self.gas_limit(tx).await;

        if self.dry_mode {
            info!(
                "dry mode, not broadcasting to={} max_fee={} priority_fee={} gas_limit={}",
                tx.to, fees.max_fee_per_gas, fees.max_priority_fee_per_gas, gas_limit
            );
            return Ok(true);
        }

        if prefer_relay && self.relay_usable() {
            match self.send_via_relay(tx, &fees, gas_limit).await {
                Ok(true) => return Ok(true),
                // A bundle that misses its whole window counts as a relay
                // failure just like a transport error.
                Ok(false) => {
                    info!("relay bundles not included, cooling down and falling back to public mempool");
                    self.mark_relay_failed();
                }
                Err(e) => {
                    warn!("relay submission failed, cooling down error={e}");
                    self.mark_relay_failed();
                }
            }
        }

        self.send_via_mempool(tx, &fees, gas_limit).await
    }

    fn mark_relay_failed(&self) {
        if let Ok(mut failed_at) = self.relay_failed_at.lock() {
            *failed_at = Some(Instant::now());
        }
    }

    fn relay_usable(&self) -> bool {
        if self.relay.is_none() {
            return false;
        }
        match self.relay_failed_at.lock() {
            Ok(failed_at) => {
                failed_at.map_or(true, |instant| instant.elapsed() >= RELAY_COOLDOWN)
            }
            Err(_) => false,
        }
    }

    async fn send_via_relay(
        &self,
        tx: &TxRequest,
        fees: &FeeParams,
        gas_limit: u64,
    ) -> Result<bool> {
        let relay = self
            .relay
            .as_ref()
            .ok_or_else(|| WardenError::RelayError("no relay configured".to_string()))?;
        let head = self.reader.latest_block().await?.number;
        let target_blocks: Range<u64> = (head + 1)..(head + 1 + self.timeout_blocks);
        let tx_hash = relay.submit_bundle(tx, fees, gas_limit, target_blocks.clone()).await?;
        info!(
            "relay bundles submitted tx_hash={} first_target={} last_target={}",
            tx_hash,
            target_blocks.start,
            target_blocks.end - 1
        );
        self.submitter.wait_for_inclusion(tx_hash, self.inclusion_timeout()).await
    }

    async fn send_via_mempool(
        &self,
        tx: &TxRequest,
        fees: &FeeParams,
        gas_limit: u64,
    ) -> Result<bool> {
        let tx_hash = self.submitter.submit(tx, fees, gas_limit).await?;
        info!("transaction broadcast tx_hash={tx_hash}");
        let included = self.submitter.wait_for_inclusion(tx_hash, self.inclusion_timeout()).await?;
        if !included {
            warn!(
                "transaction not included within {} blocks tx_hash={}",
                self.timeout_blocks, tx_hash
            );
        }
        Ok(included)
    }

    fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs((self.timeout_blocks + 1) * SLOT_TIME_SECONDS)
    }

    /// Priority fee is a percentile of recent tips clamped into the
    /// configured band; the fee cap leaves room for two base-fee doublings.
    async fn fee_params(&self) -> Result<FeeParams> {
        let head = self.reader.latest_block().await?.number;
        let history = self
            .reader
            .fee_history(1, head, &[self.gas_config.priority_fee_percentile])
            .await?;
        let observed: Wei =
            history.reward.first().and_then(|row| row.first()).copied().unwrap_or(0);
        let priority = observed
            .clamp(self.gas_config.min_priority_fee, self.gas_config.max_priority_fee);
        let pending_base_fee = self.reader.pending_base_fee().await?;
        Ok(FeeParams {
            max_fee_per_gas: 2 * pending_base_fee + priority,
            max_priority_fee_per_gas: priority,
        })
    }

    /// Estimate with headroom, capped at the configured limit. A reverting
    /// estimate falls back to the cap: the revert may be transient and the
    /// submission path re-checks anyway.
    async fn gas_limit(&self, tx: &TxRequest) -> u64 {
        match self.submitter.estimate_gas(tx).await {
            Ok(estimate) => {
                let padded = estimate.saturating_mul(GAS_ESTIMATE_HEADROOM_PERCENT) / 100;
                padded.min(self.gas_config.contract_gas_limit)
            }
            Err(e) => {
                warn!(
                    "gas estimation failed, using contract limit fallback={} error={}",
                    self.gas_config.contract_gas_limit, e
                );
                self.gas_config.contract_gas_limit
            }
        }
    }
}
