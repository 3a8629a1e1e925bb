//! CLI configuration via environment variables
//!
//! Output preferences only; arena and symbol settings come from
//! `paribridge-config`.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON output (PARIBRIDGE_OUTPUT=json)
    pub default_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("PARIBRIDGE_OUTPUT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_env() {
        env::remove_var("PARIBRIDGE_OUTPUT");
        assert!(!Config::from_env().default_json);

        env::set_var("PARIBRIDGE_OUTPUT", "JSON");
        assert!(Config::from_env().default_json);
        env::remove_var("PARIBRIDGE_OUTPUT");
    }
}
