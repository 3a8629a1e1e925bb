//! Configuration file schema
//!
//! The same schema is used for the global file and for `paribridge.toml`:
//!
//! ```toml
//! [arena]
//! initial_size = "8m"
//! max_size = "64m"
//! limb_order = "lsw"
//!
//! [symbols]
//! libraries = ["libpari.so"]
//! process_lookup = true
//!
//! [logging]
//! level = "info"
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A byte count written as an integer or as a string with a `k`, `m` or `g`
/// suffix (binary multiples)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawByteSize", into = "u64")]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 3] = [(1 << 30, "g"), (1 << 20, "m"), (1 << 10, "k")];
        for (unit, suffix) in UNITS {
            if self.0 >= unit && self.0 % unit == 0 {
                return write!(f, "{}{}", self.0 / unit, suffix);
            }
        }
        write!(f, "{}", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = match s.chars().last().map(|c| c.to_ascii_lowercase()) {
            Some('k') => (&s[..s.len() - 1], 1u64 << 10),
            Some('m') => (&s[..s.len() - 1], 1u64 << 20),
            Some('g') => (&s[..s.len() - 1], 1u64 << 30),
            _ => (s, 1),
        };
        let count: u64 = digits
            .trim()
            .parse()
            .map_err(|_| format!("invalid size '{}'", s))?;
        count
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| format!("size '{}' is too large", s))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = String;

    fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
        match raw {
            RawByteSize::Bytes(n) => Ok(ByteSize(n)),
            RawByteSize::Text(text) => text.parse(),
        }
    }
}

/// Significance order of integer limbs in arena cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimbOrder {
    /// Least significant limb first
    #[default]
    Lsw,
    /// Most significant limb first
    Msw,
}

impl FromStr for LimbOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lsw" => Ok(LimbOrder::Lsw),
            "msw" => Ok(LimbOrder::Msw),
            other => Err(format!("must be 'lsw' or 'msw', got '{}'", other)),
        }
    }
}

/// `[arena]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArenaSettings {
    /// Bytes committed when the arena is initialized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_size: Option<ByteSize>,

    /// Bytes the arena may grow to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<ByteSize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limb_order: Option<LimbOrder>,
}

/// `[symbols]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolSettings {
    /// Shared libraries searched for foreign symbols, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<PathBuf>,

    /// Fall back to symbols already linked into the process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_lookup: Option<bool>,
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// One configuration file, global or project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arena: Option<ArenaSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<SymbolSettings>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSettings>,
}

impl ConfigFile {
    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;
        Self::parse(&content, path)
    }

    /// Parse file contents; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(arena) = &self.arena {
            if let (Some(initial), Some(max)) = (arena.initial_size, arena.max_size) {
                if max < initial {
                    return Err(ConfigError::InvalidValue {
                        field: "arena.max_size".to_string(),
                        reason: format!("{} is smaller than initial_size {}", max, initial),
                    });
                }
            }
        }
        if let Some(level) = self.logging.as_ref().and_then(|l| l.level.as_deref()) {
            if level.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge `other` over this file
    ///
    /// Scalar settings in `other` win when present; libraries are appended
    /// after the ones already listed, skipping duplicates.
    pub fn merge(&mut self, other: &ConfigFile) {
        if let Some(theirs) = &other.arena {
            let arena = self.arena.get_or_insert_with(Default::default);
            if theirs.initial_size.is_some() {
                arena.initial_size = theirs.initial_size;
            }
            if theirs.max_size.is_some() {
                arena.max_size = theirs.max_size;
            }
            if theirs.limb_order.is_some() {
                arena.limb_order = theirs.limb_order;
            }
        }
        if let Some(theirs) = &other.symbols {
            let symbols = self.symbols.get_or_insert_with(Default::default);
            for library in &theirs.libraries {
                if !symbols.libraries.contains(library) {
                    symbols.libraries.push(library.clone());
                }
            }
            if theirs.process_lookup.is_some() {
                symbols.process_lookup = theirs.process_lookup;
            }
        }
        if let Some(theirs) = &other.logging {
            if theirs.level.is_some() {
                self.logging = Some(theirs.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("4096", 4096)]
    #[case("64k", 64 << 10)]
    #[case("8M", 8 << 20)]
    #[case(" 2g ", 2 << 30)]
    fn test_parse_byte_size(#[case] text: &str, #[case] bytes: u64) {
        assert_eq!(text.parse::<ByteSize>().unwrap().bytes(), bytes);
    }

    #[rstest]
    #[case("")]
    #[case("m")]
    #[case("12q")]
    #[case("-1k")]
    #[case("99999999999999999999g")]
    fn test_reject_bad_byte_size(#[case] text: &str) {
        assert!(text.parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize::new(8 << 20).to_string(), "8m");
        assert_eq!(ByteSize::new(1 << 30).to_string(), "1g");
        assert_eq!(ByteSize::new(1500).to_string(), "1500");
    }

    #[test]
    fn test_parse_full_file() {
        let toml = r#"
[arena]
initial_size = "1m"
max_size = 16777216
limb_order = "msw"

[symbols]
libraries = ["libpari.so"]
process_lookup = false

[logging]
level = "debug"
"#;
        let config = ConfigFile::parse(toml, Path::new("test.toml")).unwrap();
        let arena = config.arena.unwrap();
        assert_eq!(arena.initial_size, Some(ByteSize::new(1 << 20)));
        assert_eq!(arena.max_size, Some(ByteSize::new(16 << 20)));
        assert_eq!(arena.limb_order, Some(LimbOrder::Msw));
        let symbols = config.symbols.unwrap();
        assert_eq!(symbols.libraries, vec![PathBuf::from("libpari.so")]);
        assert_eq!(symbols.process_lookup, Some(false));
        assert_eq!(config.logging.unwrap().level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[arena]
initial_size = "1m"
stack = 3
"#;
        let err = ConfigFile::parse(toml, Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError { .. }));
    }

    #[test]
    fn test_bad_limb_order_rejected() {
        let toml = "[arena]\nlimb_order = \"middle\"\n";
        assert!(ConfigFile::parse(toml, Path::new("test.toml")).is_err());
    }

    #[test]
    fn test_max_below_initial_rejected() {
        let toml = "[arena]\ninitial_size = \"2m\"\nmax_size = \"1m\"\n";
        let err = ConfigFile::parse(toml, Path::new("test.toml")).unwrap_err();
        assert!(err.to_string().contains("arena.max_size"));
    }

    #[test]
    fn test_merge_overrides_and_appends() {
        let mut base = ConfigFile {
            arena: Some(ArenaSettings {
                initial_size: Some(ByteSize::new(1 << 20)),
                max_size: Some(ByteSize::new(1 << 24)),
                limb_order: None,
            }),
            symbols: Some(SymbolSettings {
                libraries: vec![PathBuf::from("a.so")],
                process_lookup: Some(true),
            }),
            logging: None,
        };
        let overlay = ConfigFile {
            arena: Some(ArenaSettings {
                initial_size: Some(ByteSize::new(1 << 21)),
                ..Default::default()
            }),
            symbols: Some(SymbolSettings {
                libraries: vec![PathBuf::from("a.so"), PathBuf::from("b.so")],
                process_lookup: None,
            }),
            logging: Some(LoggingSettings {
                level: Some("trace".to_string()),
            }),
        };

        base.merge(&overlay);

        let arena = base.arena.as_ref().unwrap();
        assert_eq!(arena.initial_size, Some(ByteSize::new(1 << 21)));
        assert_eq!(arena.max_size, Some(ByteSize::new(1 << 24)));
        let symbols = base.symbols.as_ref().unwrap();
        assert_eq!(
            symbols.libraries,
            vec![PathBuf::from("a.so"), PathBuf::from("b.so")]
        );
        assert_eq!(symbols.process_lookup, Some(true));
        assert_eq!(base.logging.unwrap().level.as_deref(), Some("trace"));
    }
}
