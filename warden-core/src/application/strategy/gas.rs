//! Adaptive gas-price ceiling.
//!
//! The ceiling for a deposit is normally a low percentile of the last day of
//! base fees, so the daemon deposits during lulls instead of chasing spikes.
//! When the buffer grows past `max_buffered_ethers` waiting costs more than
//! the gas saved, and the hard `max_gas_fee` ceiling takes over.

use std::sync::Mutex;

use log::debug;

use crate::foundation::constants::{BLOCKS_IN_ONE_DAY, FEE_HISTORY_REQUEST_SIZE};
use crate::foundation::error::{Result, WardenError};
use crate::foundation::types::{BlockNumber, Wei};
use crate::foundation::util::percentile;
use crate::infrastructure::chain::ChainReader;
use crate::infrastructure::config::GasConfig;

/// Blocks a fetched fee history stays valid for.
const FEE_CACHE_LIFETIME_BLOCKS: u64 = 300;

struct FeeCache {
    fetched_at_block: BlockNumber,
    base_fees: Vec<Wei>,
}

pub struct GasPriceCalculator {
    reader: std::sync::Arc<dyn ChainReader>,
    config: GasConfig,
    cache: Mutex<Option<FeeCache>>,
}

impl GasPriceCalculator {
    pub fn new(reader: std::sync::Arc<dyn ChainReader>, config: GasConfig) -> Self {
        GasPriceCalculator { reader, config, cache: Mutex::new(None) }
    }

    /// The percentile ceiling over the configured lookback window.
    pub async fn recommended_gas_fee(&self) -> Result<Wei> {
        let head = self.reader.latest_block().await?.number;
        let base_fees = self.base_fee_window(head).await?;
        percentile(&base_fees, self.config.gas_fee_percentile)
            .ok_or_else(|| WardenError::RpcError("empty fee history".to_string()))
    }

    /// Whether the pending base fee clears the applicable ceiling.
    pub async fn is_gas_price_ok(&self, depositable_ether: Wei) -> Result<bool> {
        let pending = self.reader.pending_base_fee().await?;
        let ceiling = if depositable_ether > self.config.max_buffered_ethers {
            self.config.max_gas_fee
        } else {
            self.recommended_gas_fee().await?
        };
        debug!(
            "gas gate pending_base_fee={} ceiling={} congested_buffer={}",
            pending,
            ceiling,
            depositable_ether > self.config.max_buffered_ethers
        );
        Ok(pending <= ceiling)
    }

    async fn base_fee_window(&self, head: BlockNumber) -> Result<Vec<Wei>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.as_ref() {
                if head.saturating_sub(cached.fetched_at_block) < FEE_CACHE_LIFETIME_BLOCKS {
                    return Ok(cached.base_fees.clone());
                }
            }
        }

        let total = self.config.gas_fee_percentile_days * BLOCKS_IN_ONE_DAY;
        let mut base_fees = Vec::with_capacity(total as usize);
        let mut newest = head;
        let mut remaining = total;
        while remaining > 0 {
            let count = remaining.min(FEE_HISTORY_REQUEST_SIZE);
            let history = self.reader.fee_history(count, newest, &[]).await?;
            if history.base_fee_per_gas.is_empty() {
                break;
            }
            base_fees.extend_from_slice(&history.base_fee_per_gas);
            remaining = remaining.saturating_sub(count);
            // The next page ends just before this one started; the extra
            // block of slack avoids re-fetching the boundary block.
            if history.oldest_block < 2 {
                break;
            }
            newest = history.oldest_block - 2;
        }

        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(FeeCache { fetched_at_block: head, base_fees: base_fees.clone() });
        }
        Ok(base_fees)
    }
}
