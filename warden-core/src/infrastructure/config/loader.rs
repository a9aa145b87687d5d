//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (WARDEN_* prefix)

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::{debug, info};

use crate::foundation::error::{Result, WardenError};
use crate::foundation::util::parse_address;
use crate::infrastructure::config::types::AppConfig;

/// Environment variable prefix for config overrides.
///
/// Example: `WARDEN_GAS__MAX_GAS_FEE` -> `gas.max_gas_fee`
const ENV_PREFIX: &str = "WARDEN_";

/// Load configuration from the default file in `data_dir` (`warden.toml`).
pub fn load_config(data_dir: &Path) -> Result<AppConfig> {
    load_config_from_file(&data_dir.join("warden.toml"))
}

/// Load configuration from a specific file path.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    info!("loading configuration path={}", path.display());
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!(
            "configuration file missing; using defaults and env only path={}",
            path.display()
        );
    }
    let config: AppConfig = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
    validate(&config)?;
    debug!(
        "configuration loaded rpc_endpoints={} dry_mode={} whitelist={:?}",
        config.node.rpc_urls.len(),
        config.account.is_dry_mode(),
        config.modules.whitelist,
    );
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.node.rpc_urls.is_empty() {
        return Err(WardenError::ConfigError("node.rpc_urls must not be empty".to_string()));
    }
    for (name, value) in [
        ("contracts.security", &config.contracts.security),
        ("contracts.staking_router", &config.contracts.staking_router),
        ("contracts.staking_pool", &config.contracts.staking_pool),
        ("contracts.deposit_vault", &config.contracts.deposit_vault),
    ] {
        parse_address(value)
            .map_err(|e| WardenError::ConfigError(format!("{name} is not a valid address: {e}")))?;
    }
    if config.transports.onchain_bus {
        let bus = config.contracts.data_bus.as_deref().unwrap_or("");
        parse_address(bus).map_err(|e| {
            WardenError::ConfigError(format!(
                "contracts.data_bus is required when transports.onchain_bus is enabled: {e}"
            ))
        })?;
    }
    if config.gas.gas_fee_percentile <= 0.0 || config.gas.gas_fee_percentile > 100.0 {
        return Err(WardenError::ConfigError(
            "gas.gas_fee_percentile must be in (0, 100]".to_string(),
        ));
    }
    if config.gas.min_priority_fee > config.gas.max_priority_fee {
        return Err(WardenError::ConfigError(
            "gas.min_priority_fee exceeds gas.max_priority_fee".to_string(),
        ));
    }
    if config.modules.whitelist.is_empty() {
        return Err(WardenError::ConfigError("modules.whitelist must not be empty".to_string()));
    }
    Ok(())
}
