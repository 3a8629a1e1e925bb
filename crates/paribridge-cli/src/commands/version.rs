//! Version command - report the CLI and foreign library versions

use anyhow::Result;
use paribridge_config::Config;

pub fn run(config: &Config) -> Result<()> {
    let bridge = super::open_bridge(config)?;
    println!("paribridge {}", env!("CARGO_PKG_VERSION"));
    println!("{}", bridge.version());
    bridge.close()?;
    Ok(())
}
