//! Deposit gating strategies.
//!
//! Modules fall into two pricing families: curated modules use the baseline
//! gas-allowance curve and deposit from a single key, community modules use
//! a steeper curve and need a larger batch before a deposit pays for itself.
//! The registry maps module ids to their strategy; anything not listed as a
//! community module gets the baseline one.

pub mod gas;
pub mod gate;

use std::collections::HashMap;

use crate::foundation::types::Wei;
use crate::infrastructure::config::ModulesConfig;

/// Maps a depositable key count to the base fee the deposit is still worth
/// paying, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasCurve {
    /// `(n^3 + 100) * 10^8`: tolerant at small counts, grows cubically.
    Baseline,
    /// `n^4 * 10^8`: near zero until the batch is meaningful.
    Steep,
}

impl GasCurve {
    pub fn allowance(&self, keys: u64) -> Wei {
        let n = keys as Wei;
        match self {
            GasCurve::Baseline => {
                n.saturating_mul(n).saturating_mul(n).saturating_add(100).saturating_mul(100_000_000)
            }
            GasCurve::Steep => n
                .saturating_mul(n)
                .saturating_mul(n)
                .saturating_mul(n)
                .saturating_mul(100_000_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleStrategy {
    pub curve: GasCurve,
    /// Below this many depositable keys the module is not worth a deposit.
    pub min_keys: u64,
}

const CURATED: ModuleStrategy = ModuleStrategy { curve: GasCurve::Baseline, min_keys: 1 };
const COMMUNITY: ModuleStrategy = ModuleStrategy { curve: GasCurve::Steep, min_keys: 2 };

pub struct StrategyRegistry {
    overrides: HashMap<u64, ModuleStrategy>,
}

impl StrategyRegistry {
    pub fn from_config(modules: &ModulesConfig) -> Self {
        let overrides =
            modules.community_modules.iter().map(|id| (*id, COMMUNITY)).collect();
        StrategyRegistry { overrides }
    }

    pub fn for_module(&self, module_id: u64) -> ModuleStrategy {
        self.overrides.get(&module_id).copied().unwrap_or(CURATED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_curve_values() {
        assert_eq!(GasCurve::Baseline.allowance(0), 100 * 100_000_000);
        assert_eq!(GasCurve::Baseline.allowance(1), 101 * 100_000_000);
        assert_eq!(GasCurve::Baseline.allowance(10), 1_100 * 100_000_000);
    }

    #[test]
    fn steep_curve_is_zero_without_keys() {
        assert_eq!(GasCurve::Steep.allowance(0), 0);
        assert_eq!(GasCurve::Steep.allowance(1), 100_000_000);
        assert_eq!(GasCurve::Steep.allowance(10), 10_000 * 100_000_000);
    }

    #[test]
    fn registry_routes_community_modules() {
        let registry = StrategyRegistry::from_config(&ModulesConfig {
            whitelist: vec![1, 3],
            community_modules: vec![3],
            ..Default::default()
        });
        assert_eq!(registry.for_module(1), CURATED);
        assert_eq!(registry.for_module(3), COMMUNITY);
        // Unknown modules default to the curated strategy.
        assert_eq!(registry.for_module(9), CURATED);
    }
}
