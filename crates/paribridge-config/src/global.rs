//! Global configuration (~/.paribridge/config.toml)

use crate::settings::ConfigFile;
use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Get the global configuration directory (~/.paribridge)
pub fn global_config_dir() -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(home.join(".paribridge"))
}

/// Get the global config file path (~/.paribridge/config.toml)
pub fn global_config_path() -> ConfigResult<PathBuf> {
    Ok(global_config_dir()?.join("config.toml"))
}

/// Load the global file; a missing file yields the defaults
pub fn load_global_config(path: &Path) -> ConfigResult<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    ConfigFile::load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_global_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_global_config(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_invalid_global_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[arena\n").unwrap();
        assert!(matches!(
            load_global_config(&path),
            Err(ConfigError::TomlParseError { .. })
        ));
    }

    #[test]
    fn test_global_path_lives_under_home() {
        if let Ok(path) = global_config_path() {
            assert!(path.ends_with(".paribridge/config.toml"));
        }
    }
}
