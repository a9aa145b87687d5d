pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_file};
pub use types::{
    AccountConfig, AppConfig, ContractsConfig, ExecutorConfig, GasConfig, ModulesConfig,
    NodeConfig, RelayConfig, TransportsConfig,
};

/// Environment variable holding the submitter private key. Kept out of the
/// config file so it never lands on disk.
pub const PRIVATE_KEY_ENV: &str = "WARDEN_ACCOUNT__PRIVATE_KEY";
