//! Poly command - build a polynomial from coefficients, lowest degree first

use crate::{args, output};
use anyhow::Result;
use paribridge_config::Config;
use paribridge_runtime::Value;

pub fn run(config: &Config, raw_coeffs: &[String], json: bool) -> Result<()> {
    let coeffs = Value::sequence(args::parse_values(raw_coeffs)?);
    let mut bridge = super::open_bridge(config)?;
    let pol = bridge.call("unipoly", &[coeffs])?;
    let normalized = bridge.call("handle_data", &[pol.clone()])?;

    if json {
        println!("{}", output::to_json(&normalized));
    } else {
        match bridge.call("handle_describe", &[pol])? {
            Value::Text(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            other => println!("{}", other),
        }
        println!("coefficients {}", output::render_text(&normalized));
    }
    bridge.close()?;
    Ok(())
}
