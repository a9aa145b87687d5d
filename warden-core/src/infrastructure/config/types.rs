//! Configuration model.
//!
//! Every section derives `Serialize` so compiled defaults can seed the
//! figment pipeline, and `Deserialize` with per-field defaults so partial
//! TOML files stay valid.

use serde::{Deserialize, Serialize};

use crate::foundation::types::{Wei, ETHER, GWEI};

/// Wei amounts overflow both TOML's signed 64-bit integers and figment's
/// value model, so they serialize as decimal strings. Deserialization still
/// accepts plain integers where they fit.
mod wei_field {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    use crate::foundation::types::Wei;

    pub fn serialize<S: Serializer>(value: &Wei, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Wei, D::Error> {
        struct WeiVisitor;

        impl<'de> Visitor<'de> for WeiVisitor {
            type Value = Wei;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a wei amount as an integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Wei, E> {
                Ok(Wei::from(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Wei, E> {
                Wei::try_from(value).map_err(|_| E::custom("wei amount must not be negative"))
            }

            fn visit_u128<E: de::Error>(self, value: u128) -> Result<Wei, E> {
                Ok(value)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Wei, E> {
                value.trim().parse().map_err(|_| E::custom("invalid wei amount"))
            }
        }

        deserializer.deserialize_any(WeiVisitor)
    }
}

/// Execution-layer node endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Ordered list of RPC endpoints; the first healthy one wins.
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

/// Submitter account. Without a private key the engine runs in dry mode:
/// every decision is made and logged but nothing is broadcast.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub private_key: Option<String>,
}

impl AccountConfig {
    pub fn is_dry_mode(&self) -> bool {
        self.private_key.as_deref().map(str::trim).unwrap_or("").is_empty()
    }
}

/// Protocol contract addresses, hex-encoded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub security: String,
    #[serde(default)]
    pub staking_router: String,
    #[serde(default)]
    pub staking_pool: String,
    #[serde(default)]
    pub deposit_vault: String,
    /// On-chain message bus; optional, the scanner transport is skipped
    /// without it.
    #[serde(default)]
    pub data_bus: Option<String>,
}

/// Gas gating and fee pricing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GasConfig {
    /// Hard ceiling used when the buffer is congested, in wei.
    #[serde(default = "default_max_gas_fee", with = "wei_field")]
    pub max_gas_fee: Wei,
    /// Percentile of recent base fees used as the adaptive ceiling.
    #[serde(default = "default_gas_fee_percentile")]
    pub gas_fee_percentile: f64,
    /// Days of history the adaptive percentile looks back over.
    #[serde(default = "default_gas_fee_percentile_days")]
    pub gas_fee_percentile_days: u64,
    /// Buffered ether above which the hard ceiling replaces the percentile.
    #[serde(default = "default_max_buffered_ethers", with = "wei_field")]
    pub max_buffered_ethers: Wei,
    /// Percentile of recent priority rewards used for tips.
    #[serde(default = "default_priority_fee_percentile")]
    pub priority_fee_percentile: f64,
    #[serde(default = "default_min_priority_fee", with = "wei_field")]
    pub min_priority_fee: Wei,
    #[serde(default = "default_max_priority_fee", with = "wei_field")]
    pub max_priority_fee: Wei,
    /// Fallback gas limit when estimation reverts, and the cap otherwise.
    #[serde(default = "default_contract_gas_limit")]
    pub contract_gas_limit: u64,
}

fn default_max_gas_fee() -> Wei {
    100 * GWEI
}

fn default_gas_fee_percentile() -> f64 {
    20.0
}

fn default_gas_fee_percentile_days() -> u64 {
    1
}

fn default_max_buffered_ethers() -> Wei {
    5_000 * ETHER
}

fn default_priority_fee_percentile() -> f64 {
    25.0
}

fn default_min_priority_fee() -> Wei {
    50_000_000
}

fn default_max_priority_fee() -> Wei {
    10 * GWEI
}

fn default_contract_gas_limit() -> u64 {
    15_000_000
}

impl Default for GasConfig {
    fn default() -> Self {
        GasConfig {
            max_gas_fee: default_max_gas_fee(),
            gas_fee_percentile: default_gas_fee_percentile(),
            gas_fee_percentile_days: default_gas_fee_percentile_days(),
            max_buffered_ethers: default_max_buffered_ethers(),
            priority_fee_percentile: default_priority_fee_percentile(),
            min_priority_fee: default_min_priority_fee(),
            max_priority_fee: default_max_priority_fee(),
            contract_gas_limit: default_contract_gas_limit(),
        }
    }
}

/// Private relay settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub url: Option<String>,
    /// Blocks a submission may wait for inclusion before the next fallback.
    #[serde(default = "default_submission_timeout_blocks")]
    pub submission_timeout_blocks: u64,
}

fn default_submission_timeout_blocks() -> u64 {
    crate::foundation::constants::SUBMISSION_TIMEOUT_IN_BLOCKS
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig { url: None, submission_timeout_blocks: default_submission_timeout_blocks() }
    }
}

/// Block-cadence executor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Blocks to skip between cycles after a successful one.
    #[serde(default = "default_cadence_blocks")]
    pub cadence_blocks: u64,
    /// Hard deadline for a single cycle, in seconds.
    #[serde(default = "default_max_cycle_lifetime_secs")]
    pub max_cycle_lifetime_secs: u64,
}

fn default_cadence_blocks() -> u64 {
    1
}

fn default_max_cycle_lifetime_secs() -> u64 {
    1_200
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            cadence_blocks: default_cadence_blocks(),
            max_cycle_lifetime_secs: default_max_cycle_lifetime_secs(),
        }
    }
}

/// Staking module routing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Modules this instance deposits to.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<u64>,
    /// Modules priced on the steeper community gas curve, with the higher
    /// minimum-keys threshold.
    #[serde(default)]
    pub community_modules: Vec<u64>,
    /// Seconds a module sits out after a failed cycle before it is
    /// reconsidered.
    #[serde(default = "default_failed_module_cooldown_secs")]
    pub failed_module_cooldown_secs: u64,
    /// Minimum vault balance before the direct-deposit path is attempted,
    /// in wei.
    #[serde(default = "default_direct_deposit_threshold", with = "wei_field")]
    pub direct_deposit_threshold: Wei,
}

fn default_whitelist() -> Vec<u64> {
    vec![1]
}

fn default_failed_module_cooldown_secs() -> u64 {
    900
}

fn default_direct_deposit_threshold() -> Wei {
    32 * ETHER
}

impl Default for ModulesConfig {
    fn default() -> Self {
        ModulesConfig {
            whitelist: default_whitelist(),
            community_modules: Vec::new(),
            failed_module_cooldown_secs: default_failed_module_cooldown_secs(),
            direct_deposit_threshold: default_direct_deposit_threshold(),
        }
    }
}

/// Which message transports are active.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportsConfig {
    #[serde(default = "default_true")]
    pub onchain_bus: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TransportsConfig {
    fn default() -> Self {
        TransportsConfig { onchain_bus: true }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub transports: TransportsConfig,
}
