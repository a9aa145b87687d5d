//! Process setup: logging and configuration.

use std::path::Path;
use std::sync::Arc;

use warden_core::infrastructure::config::{self, AppConfig};
use warden_core::{Result, WardenError};

/// Initializes the tracing subscriber. `level` is an env-filter directive
/// such as `info` or `warden_core=debug`; the `RUST_LOG` environment
/// variable wins when set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .map_err(|err| WardenError::Message(err.to_string()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
    Ok(())
}

pub fn load_app_config(data_dir: &Path) -> Result<Arc<AppConfig>> {
    config::load_config(data_dir).map(Arc::new)
}

pub fn load_app_config_from_file(path: &Path) -> Result<Arc<AppConfig>> {
    config::load_config_from_file(path).map(Arc::new)
}
