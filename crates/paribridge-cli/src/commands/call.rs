//! Call command - invoke a foreign function by name

use crate::{args, output};
use anyhow::{Context, Result};
use paribridge_config::Config;
use tracing::debug;

/// Convert `raw_args`, call `name` with that many arguments and print the
/// decoded result
pub fn run(config: &Config, name: &str, raw_args: &[String], json: bool) -> Result<()> {
    let values = args::parse_values(raw_args)?;
    let mut bridge = super::open_bridge(config)?;
    debug!(name, args = values.len(), "calling foreign function");

    let result = bridge
        .call_foreign(name, &values)
        .with_context(|| format!("{} failed", name))?;

    if json {
        println!("{}", output::to_json(&result));
    } else {
        println!("{}", output::render_text(&result));
    }
    bridge.close()?;
    Ok(())
}
