//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global;
use crate::project;
use crate::settings::{ByteSize, ConfigFile, LimbOrder, LoggingSettings};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_ARENA_SIZE: ByteSize = ByteSize::new(8 << 20);
pub const DEFAULT_ARENA_MAX_SIZE: ByteSize = ByteSize::new(64 << 20);
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const ENV_ARENA_SIZE: &str = "PARIBRIDGE_ARENA_SIZE";
pub const ENV_ARENA_MAX_SIZE: &str = "PARIBRIDGE_ARENA_MAX_SIZE";
pub const ENV_LIMB_ORDER: &str = "PARIBRIDGE_LIMB_ORDER";
pub const ENV_LOG: &str = "PARIBRIDGE_LOG";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.paribridge/config.toml) - lowest priority
/// 2. Project config (./paribridge.toml) - overrides global
/// 3. Environment variables (PARIBRIDGE_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Merged settings
    pub file: ConfigFile,

    /// Directory where paribridge.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the global layer from `path` instead of the home directory
    pub fn with_global_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find paribridge.toml, layers it over the
    /// global file and applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = project::find_project_config(start_dir)?;
        self.assemble(project_config, project_root)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ConfigFile::load_from_file(config_path)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());
        self.assemble(project_config, project_root)
    }

    fn assemble(
        &mut self,
        project_config: ConfigFile,
        project_root: Option<PathBuf>,
    ) -> ConfigResult<Config> {
        let mut file = self.load_global_config()?;
        file.merge(&project_config);
        apply_env_overrides(&mut file)?;
        file.validate()?;
        let config = Config { file, project_root };
        config.check_sizes()?;
        Ok(config)
    }

    fn load_global_config(&mut self) -> ConfigResult<ConfigFile> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match global::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global layer
                Err(ConfigError::HomeNotFound) => return Ok(ConfigFile::default()),
                Err(e) => return Err(e),
            },
        };
        global::load_global_config(&path)
    }
}

/// Apply PARIBRIDGE_* environment variables over the merged file
fn apply_env_overrides(file: &mut ConfigFile) -> ConfigResult<()> {
    let mut overlay = ConfigFile::default();

    if let Some(size) = env_value::<ByteSize>(ENV_ARENA_SIZE)? {
        overlay.arena.get_or_insert_with(Default::default).initial_size = Some(size);
    }
    if let Some(size) = env_value::<ByteSize>(ENV_ARENA_MAX_SIZE)? {
        overlay.arena.get_or_insert_with(Default::default).max_size = Some(size);
    }
    if let Some(order) = env_value::<LimbOrder>(ENV_LIMB_ORDER)? {
        overlay.arena.get_or_insert_with(Default::default).limb_order = Some(order);
    }
    if let Ok(level) = env::var(ENV_LOG) {
        if !level.trim().is_empty() {
            overlay.logging = Some(LoggingSettings { level: Some(level) });
        }
    }

    file.merge(&overlay);
    Ok(())
}

fn env_value<T>(name: &str) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|reason| ConfigError::InvalidValue {
                field: name.to_string(),
                reason,
            }),
        _ => Ok(None),
    }
}

impl Config {
    /// Bytes committed at arena initialization
    pub fn arena_initial_size(&self) -> u64 {
        self.file
            .arena
            .as_ref()
            .and_then(|a| a.initial_size)
            .unwrap_or(DEFAULT_ARENA_SIZE)
            .bytes()
    }

    /// Bytes the arena may grow to; never below the initial size
    pub fn arena_max_size(&self) -> u64 {
        let configured = self.file.arena.as_ref().and_then(|a| a.max_size);
        match configured {
            Some(max) => max.bytes(),
            None => DEFAULT_ARENA_MAX_SIZE.bytes().max(self.arena_initial_size()),
        }
    }

    pub fn limb_order(&self) -> LimbOrder {
        self.file
            .arena
            .as_ref()
            .and_then(|a| a.limb_order)
            .unwrap_or_default()
    }

    /// Libraries to load, in search order
    pub fn libraries(&self) -> &[PathBuf] {
        self.file
            .symbols
            .as_ref()
            .map(|s| s.libraries.as_slice())
            .unwrap_or(&[])
    }

    pub fn process_lookup(&self) -> bool {
        self.file
            .symbols
            .as_ref()
            .and_then(|s| s.process_lookup)
            .unwrap_or(true)
    }

    /// Default log filter directive
    pub fn log_level(&self) -> &str {
        self.file
            .logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a paribridge.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    fn check_sizes(&self) -> ConfigResult<()> {
        let (initial, max) = (self.arena_initial_size(), self.arena_max_size());
        if max < initial {
            return Err(ConfigError::InvalidValue {
                field: "arena.max_size".to_string(),
                reason: format!(
                    "{} is smaller than initial_size {}",
                    ByteSize::new(max),
                    ByteSize::new(initial)
                ),
            });
        }
        Ok(())
    }
}
