//! Per-module deposit gate.
//!
//! A quorum alone does not justify a deposit. The gate also requires enough
//! buffered ether and module keys to matter, a pending base fee within the
//! module's curve allowance, and the global gas-price ceiling to clear.

use std::sync::Arc;

use log::info;

use crate::application::strategy::gas::GasPriceCalculator;
use crate::application::strategy::StrategyRegistry;
use crate::foundation::error::Result;
use crate::foundation::types::{Wei, ETHER};
use crate::infrastructure::chain::{ChainReader, StakingPool, StakingRouter};

const DEPOSIT_SIZE: Wei = 32 * ETHER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub approved: bool,
    /// Keys the module could actually deposit right now.
    pub keys: u64,
    pub reason: &'static str,
}

impl Assessment {
    fn rejected(keys: u64, reason: &'static str) -> Self {
        Assessment { approved: false, keys, reason }
    }
}

pub struct DepositGate {
    reader: Arc<dyn ChainReader>,
    router: Arc<dyn StakingRouter>,
    pool: Arc<dyn StakingPool>,
    gas: Arc<GasPriceCalculator>,
    registry: StrategyRegistry,
}

impl DepositGate {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        router: Arc<dyn StakingRouter>,
        pool: Arc<dyn StakingPool>,
        gas: Arc<GasPriceCalculator>,
        registry: StrategyRegistry,
    ) -> Self {
        DepositGate { reader, router, pool, gas, registry }
    }

    pub async fn assess(&self, module_id: u64) -> Result<Assessment> {
        let depositable_ether = self.pool.depositable_ether().await?;
        let keys_by_ether = (depositable_ether / DEPOSIT_SIZE) as u64;
        let module_keys = self.router.depositable_keys(module_id).await?;
        let keys = keys_by_ether.min(module_keys);

        let strategy = self.registry.for_module(module_id);
        if keys < strategy.min_keys {
            return Ok(Assessment::rejected(keys, "not enough depositable keys"));
        }

        let pending_base_fee = self.reader.pending_base_fee().await?;
        let allowance = strategy.curve.allowance(keys);
        if pending_base_fee > allowance {
            info!(
                "deposit rejected by curve module_id={} keys={} base_fee={} allowance={}",
                module_id, keys, pending_base_fee, allowance
            );
            return Ok(Assessment::rejected(keys, "base fee above curve allowance"));
        }

        if !self.gas.is_gas_price_ok(depositable_ether).await? {
            return Ok(Assessment::rejected(keys, "gas price above ceiling"));
        }

        Ok(Assessment { approved: true, keys, reason: "ok" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy_primitives::B256;

    use crate::foundation::constants::BLOCKS_IN_ONE_DAY;
    use crate::foundation::types::GWEI;
    use crate::infrastructure::chain::mock::{MockChain, MockPool, MockRouter};
    use crate::infrastructure::config::{GasConfig, ModulesConfig};

    struct Fixture {
        chain: Arc<MockChain>,
        router: Arc<MockRouter>,
        pool: Arc<MockPool>,
        gate: DepositGate,
    }

    fn fixture() -> Fixture {
        let chain = Arc::new(MockChain::new());
        chain.set_head(10_000, B256::repeat_byte(1), 10 * GWEI);
        chain.fill_fee_history(10_000, BLOCKS_IN_ONE_DAY, 10 * GWEI, GWEI);
        chain.set_pending_base_fee(5 * GWEI);
        let router = Arc::new(MockRouter::new());
        router.set_depositable_keys(1, 100);
        router.set_depositable_keys(3, 100);
        let pool = Arc::new(MockPool::new(320 * ETHER));
        let gas = Arc::new(GasPriceCalculator::new(chain.clone(), GasConfig::default()));
        let registry = StrategyRegistry::from_config(&ModulesConfig {
            whitelist: vec![1, 3],
            community_modules: vec![3],
            ..Default::default()
        });
        let gate =
            DepositGate::new(chain.clone(), router.clone(), pool.clone(), gas, registry);
        Fixture { chain, router, pool, gate }
    }

    #[tokio::test]
    async fn approves_when_all_gates_clear() {
        let f = fixture();
        let assessment = f.gate.assess(1).await.unwrap();
        assert!(assessment.approved);
        assert_eq!(assessment.keys, 10);
    }

    #[tokio::test]
    async fn keys_are_bounded_by_both_ether_and_module() {
        let f = fixture();
        f.router.set_depositable_keys(1, 3);
        assert_eq!(f.gate.assess(1).await.unwrap().keys, 3);
        f.router.set_depositable_keys(1, 100);
        f.pool.set_depositable_ether(64 * ETHER);
        assert_eq!(f.gate.assess(1).await.unwrap().keys, 2);
    }

    #[tokio::test]
    async fn community_module_needs_two_keys() {
        let f = fixture();
        f.pool.set_depositable_ether(32 * ETHER);
        // One key clears the curated threshold but not the community one.
        assert!(f.gate.assess(1).await.unwrap().approved);
        let assessment = f.gate.assess(3).await.unwrap();
        assert!(!assessment.approved);
        assert_eq!(assessment.reason, "not enough depositable keys");
    }

    #[tokio::test]
    async fn curve_rejects_expensive_small_batches() {
        let f = fixture();
        f.pool.set_depositable_ether(64 * ETHER);
        // Baseline allowance for 2 keys is (8 + 100) * 1e8 wei = 10.8 gwei.
        f.chain.set_pending_base_fee(11 * GWEI);
        let assessment = f.gate.assess(1).await.unwrap();
        assert!(!assessment.approved);
        assert_eq!(assessment.reason, "base fee above curve allowance");
    }

    #[tokio::test]
    async fn global_ceiling_still_applies() {
        let f = fixture();
        // 100 keys clears any curve, but the percentile ceiling is 10 gwei.
        f.pool.set_depositable_ether(4_000 * ETHER);
        f.chain.set_pending_base_fee(20 * GWEI);
        let assessment = f.gate.assess(1).await.unwrap();
        assert!(!assessment.approved);
        assert_eq!(assessment.reason, "gas price above ceiling");
    }
}
