pub mod call;
pub mod describe;
pub mod exports;
pub mod poly;
pub mod version;

use anyhow::{Context, Result};
use paribridge_config::Config;
use paribridge_runtime::Bridge;

/// Open a bridge from merged configuration
pub fn open_bridge(config: &Config) -> Result<Bridge> {
    Bridge::from_config(config).context("Failed to open the foreign arena")
}
