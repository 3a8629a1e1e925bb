//! Project configuration (paribridge.toml)

use crate::settings::ConfigFile;
use crate::ConfigResult;
use std::path::{Path, PathBuf};

/// File name searched for when walking up from a start directory
pub const PROJECT_FILE_NAME: &str = "paribridge.toml";

/// Walk up from `start_dir` to the nearest `paribridge.toml`
///
/// Returns the directory holding it together with its contents, or no root
/// and the defaults when the filesystem root is reached first.
pub fn find_project_config(start_dir: &Path) -> ConfigResult<(Option<PathBuf>, ConfigFile)> {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let config_path = dir.join(PROJECT_FILE_NAME);
        if config_path.exists() {
            let config = ConfigFile::load_from_file(&config_path)?;
            return Ok((Some(dir.to_path_buf()), config));
        }
        current = dir.parent();
    }
    Ok((None, ConfigFile::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ByteSize;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(PROJECT_FILE_NAME),
            "[arena]\ninitial_size = \"64k\"\n",
        )
        .unwrap();
        let nested = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let (root, config) = find_project_config(&nested).unwrap();
        assert_eq!(root.as_deref(), Some(temp_dir.path()));
        assert_eq!(
            config.arena.unwrap().initial_size,
            Some(ByteSize::new(64 << 10))
        );
    }

    #[test]
    fn test_nearest_config_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(PROJECT_FILE_NAME), "[logging]\nlevel = \"warn\"\n").unwrap();
        let inner = temp_dir.path().join("inner");
        fs::create_dir(&inner).unwrap();
        fs::write(inner.join(PROJECT_FILE_NAME), "[logging]\nlevel = \"debug\"\n").unwrap();

        let (root, config) = find_project_config(&inner).unwrap();
        assert_eq!(root.as_deref(), Some(inner.as_path()));
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("debug"));
    }
}
