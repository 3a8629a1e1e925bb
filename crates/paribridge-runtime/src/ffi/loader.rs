//! Symbol resolution for dynamic invocation
//!
//! Resolves foreign entry points by name, in order:
//! 1. the arena's own exports (arity known and checked);
//! 2. libraries loaded explicitly through `libloading`;
//! 3. the running process's dynamic symbol table (unix only).
//!
//! Handles platform-specific library naming conventions and search paths.
//! Symbols found in a library or the process are trusted to have the arity
//! the caller declares.

use crate::arena::library;
use crate::ffi::caller::CallError;
use crate::ffi::types::{Arity, NativeEntry};
use crate::value::RuntimeError;
use libloading::Library;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Library file not found in search paths
    #[error("library not found: {0}")]
    LibraryNotFound(String),
    /// Failed to load library
    #[error("failed to load library {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Where a resolved symbol came from
#[derive(Clone)]
pub enum SymbolOrigin {
    /// Exported by the arena itself
    Export,
    /// Found in a loaded library, kept alive as long as the symbol is
    Library(Arc<Library>, PathBuf),
    /// Found in the running process
    Process,
}

impl fmt::Debug for SymbolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOrigin::Export => write!(f, "Export"),
            SymbolOrigin::Library(_, path) => write!(f, "Library({})", path.display()),
            SymbolOrigin::Process => write!(f, "Process"),
        }
    }
}

impl fmt::Display for SymbolOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOrigin::Export => write!(f, "arena export"),
            SymbolOrigin::Library(_, path) => write!(f, "{}", path.display()),
            SymbolOrigin::Process => write!(f, "process"),
        }
    }
}

/// A symbol bound to an entry point of known arity
#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub entry: NativeEntry,
    pub origin: SymbolOrigin,
}

/// Name-to-entry-point resolver with caching and platform-specific path resolution
///
/// # Safety
///
/// Loading dynamic libraries is inherently unsafe. The loaded code runs in the
/// same process and can perform arbitrary operations.
pub struct SymbolResolver {
    /// Loaded libraries, in load order
    libraries: Vec<(PathBuf, Arc<Library>)>,
    /// Platform-specific library search paths
    search_paths: Vec<PathBuf>,
    /// Look symbols up in the running process as a last resort
    process_lookup: bool,
    cache: HashMap<(String, Arity), ResolvedSymbol>,
}

impl SymbolResolver {
    /// Resolver over the arena exports plus the process symbol table
    pub fn new() -> Self {
        Self {
            libraries: Vec::new(),
            search_paths: Self::default_search_paths(),
            process_lookup: true,
            cache: HashMap::new(),
        }
    }

    /// Get platform-specific default library search paths
    ///
    /// Returns standard system library paths for the current platform:
    /// - Linux: /usr/lib, /usr/local/lib, /lib
    /// - macOS: /usr/lib, /usr/local/lib, /opt/homebrew/lib
    /// - All platforms: current working directory
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(target_os = "linux")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/lib"));
            paths.push(PathBuf::from("/usr/lib64"));
            paths.push(PathBuf::from("/lib64"));
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/usr/lib"));
            paths.push(PathBuf::from("/usr/local/lib"));
            paths.push(PathBuf::from("/opt/homebrew/lib"));
        }

        // Current working directory (highest priority)
        if let Ok(cwd) = std::env::current_dir() {
            paths.insert(0, cwd);
        }

        paths
    }

    /// Resolve a library name to a file: `pari` → `libpari.so` (or `.dylib`)
    fn resolve_library_path(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.components().count() > 1 || path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        let extensions: &[&str] = if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else {
            &["so"]
        };

        for search_path in &self.search_paths {
            let exact = search_path.join(name);
            if exact.is_file() {
                return Some(exact);
            }
            for prefix in ["lib", ""] {
                for ext in extensions {
                    let full_path = search_path.join(format!("{}{}.{}", prefix, name, ext));
                    if full_path.exists() {
                        return Some(full_path);
                    }
                }
            }
        }

        None
    }

    /// Load a library by name or path and add it to the lookup order
    ///
    /// Loading a library that is already loaded is a no-op.
    pub fn load_library(&mut self, name: &str) -> Result<(), LoadError> {
        let path = self
            .resolve_library_path(name)
            .ok_or_else(|| LoadError::LibraryNotFound(name.to_string()))?;

        if self.libraries.iter().any(|(loaded, _)| *loaded == path) {
            return Ok(());
        }

        // SAFETY: loading runs the library's initialisers; the configuration
        // names only trusted libraries
        let library = unsafe { Library::new(&path) }.map_err(|e| LoadError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "loaded foreign library");
        self.libraries.push((path, Arc::new(library)));
        self.cache.clear();
        Ok(())
    }

    /// Builder form of [`load_library`](Self::load_library)
    pub fn with_library(mut self, name: &str) -> Result<Self, LoadError> {
        self.load_library(name)?;
        Ok(self)
    }

    /// Add a custom search path (prepended to search list)
    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.insert(0, path);
    }

    pub fn set_process_lookup(&mut self, enabled: bool) {
        self.process_lookup = enabled;
        self.cache.clear();
    }

    /// Get the number of loaded libraries
    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }

    /// Resolve `name` as an entry point taking `arity` arguments
    ///
    /// An arena export with a different arity is an `ArityMismatch`. A name
    /// found nowhere is `FunctionNotFound`.
    pub fn resolve(&mut self, name: &str, arity: Arity) -> Result<ResolvedSymbol, RuntimeError> {
        if let Some(hit) = self.cache.get(&(name.to_string(), arity)) {
            trace!(name, "symbol cache hit");
            return Ok(hit.clone());
        }

        let resolved = self.lookup(name, arity)?;
        debug!(name, arity = arity.count(), origin = %resolved.origin, "resolved symbol");
        self.cache
            .insert((name.to_string(), arity), resolved.clone());
        Ok(resolved)
    }

    fn lookup(&self, name: &str, arity: Arity) -> Result<ResolvedSymbol, RuntimeError> {
        if let Some(export) = library::lookup(name) {
            if export.entry.arity() != arity {
                return Err(CallError::ArityMismatch {
                    name: name.to_string(),
                    expected: export.entry.arity().count(),
                    got: arity.count(),
                }
                .into());
            }
            return Ok(ResolvedSymbol {
                entry: export.entry,
                origin: SymbolOrigin::Export,
            });
        }

        for (path, library) in &self.libraries {
            if let Some(address) = symbol_address(library, name) {
                return Ok(ResolvedSymbol {
                    // SAFETY: external symbols are trusted to match the declared arity
                    entry: unsafe { NativeEntry::from_address(address, arity) },
                    origin: SymbolOrigin::Library(Arc::clone(library), path.clone()),
                });
            }
        }

        if self.process_lookup {
            if let Some(address) = process_symbol(name) {
                return Ok(ResolvedSymbol {
                    // SAFETY: as above
                    entry: unsafe { NativeEntry::from_address(address, arity) },
                    origin: SymbolOrigin::Process,
                });
            }
        }

        Err(CallError::FunctionNotFound {
            name: name.to_string(),
        }
        .into())
    }
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn symbol_address(library: &Library, name: &str) -> Option<*const ()> {
    // SAFETY: the symbol is only read as an address here
    let symbol = unsafe { library.get::<*const ()>(name.as_bytes()) }.ok()?;
    let address = *symbol;
    (!address.is_null()).then_some(address)
}

#[cfg(unix)]
fn process_symbol(name: &str) -> Option<*const ()> {
    let this: Library = libloading::os::unix::Library::this().into();
    symbol_address(&this, name)
}

#[cfg(not(unix))]
fn process_symbol(_name: &str) -> Option<*const ()> {
    None
}
