//! Describe command - show the foreign rendering of a value

use crate::args;
use anyhow::Result;
use paribridge_config::Config;
use paribridge_runtime::Value;

pub fn run(config: &Config, raw: &str) -> Result<()> {
    let value = args::parse_value(raw)?;
    let mut bridge = super::open_bridge(config)?;
    let handle = bridge.call("to_handle", &[value])?;
    let foreign_type = bridge.call("handle_type", &[handle.clone()])?;
    let rendering = bridge.call("handle_describe", &[handle])?;
    match rendering {
        Value::Text(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
        other => println!("{}", other),
    }
    println!("type {}", foreign_type);
    bridge.close()?;
    Ok(())
}
