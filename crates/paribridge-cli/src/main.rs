use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paribridge_config::{ByteSize, ConfigLoader, LimbOrder};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod config;
mod output;

/// Call into an arena-allocated number theory library from the command line.
///
/// Values are written as integers (`-12`), bracketed lists (`[1, [2, 3]]`)
/// or quoted text (`"x"`).
///
/// EXAMPLES:
///     paribridge call gmul 12 34          Multiply two integers
///     paribridge call mkvec3 1 2 3        Build a vector
///     paribridge describe "[1, [2, 3]]"   Show the foreign rendering
///     paribridge poly 0 -1 2              Build 2*x^2 - x
///     paribridge exports                  List built-in entry points
///
/// ENVIRONMENT VARIABLES:
///     PARIBRIDGE_ARENA_SIZE      Initial arena size (e.g. 8m)
///     PARIBRIDGE_ARENA_MAX_SIZE  Maximum arena size
///     PARIBRIDGE_LIMB_ORDER      lsw or msw
///     PARIBRIDGE_LOG             Default log filter (RUST_LOG wins)
///     PARIBRIDGE_OUTPUT          Set to 'json' for JSON output by default
#[derive(Parser)]
#[command(name = "paribridge")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file to use instead of searching for paribridge.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Initial arena size (bytes, or with a k/m/g suffix)
    #[arg(long, global = true)]
    arena_size: Option<ByteSize>,

    /// Maximum arena size
    #[arg(long, global = true)]
    max_size: Option<ByteSize>,

    /// Limb order of integer cells (lsw or msw)
    #[arg(long, global = true)]
    limb_order: Option<LimbOrder>,

    /// Additional shared library to search for symbols (repeatable)
    #[arg(long = "library", short = 'l', global = true)]
    libraries: Vec<PathBuf>,

    /// Do not look up symbols in the running process
    #[arg(long, global = true)]
    no_process_lookup: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CLI and foreign library versions
    Version,

    /// Call a foreign function with up to five arguments
    ///
    /// The function is resolved with as many parameters as arguments are
    /// given; the result is decoded and printed.
    ///
    /// EXAMPLES:
    ///     paribridge call gmul 12 34
    ///     paribridge call gdiv -- -3 2
    #[command(visible_alias = "c")]
    Call {
        /// Function name
        name: String,
        /// Arguments
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a value to the foreign side and print its rendering
    Describe {
        /// Value to describe
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Build a polynomial from integer coefficients, lowest degree first
    Poly {
        /// Coefficients
        #[arg(allow_hyphen_values = true)]
        coeffs: Vec<String>,
        /// Output the normalized coefficients as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in foreign entry points
    Exports {
        /// List the host entry points instead
        #[arg(long)]
        host: bool,
    },
}

impl Cli {
    /// Merge configuration files and environment, then apply flags
    fn load_config(&self) -> Result<paribridge_config::Config> {
        let mut loader = ConfigLoader::new();
        let mut config = match &self.config {
            Some(path) => loader.load_from_file(path),
            None => loader.load_from_directory(&std::env::current_dir()?),
        }
        .context("Failed to load configuration")?;

        let mut flags = paribridge_config::ConfigFile::default();
        if self.arena_size.is_some() || self.max_size.is_some() || self.limb_order.is_some() {
            flags.arena = Some(paribridge_config::ArenaSettings {
                initial_size: self.arena_size,
                max_size: self.max_size,
                limb_order: self.limb_order,
            });
        }
        if !self.libraries.is_empty() || self.no_process_lookup {
            flags.symbols = Some(paribridge_config::SymbolSettings {
                libraries: self.libraries.clone(),
                process_lookup: self.no_process_lookup.then_some(false),
            });
        }
        config.file.merge(&flags);
        config.file.validate()?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();
    let config = cli.load_config()?;
    init_logging(config.log_level());

    match cli.command {
        Commands::Version => commands::version::run(&config)?,
        Commands::Call { name, args, json } => {
            // Command-line flag overrides environment variable
            let use_json = json || cli_config.default_json;
            commands::call::run(&config, &name, &args, use_json)?;
        }
        Commands::Describe { value } => commands::describe::run(&config, &value)?,
        Commands::Poly { coeffs, json } => {
            let use_json = json || cli_config.default_json;
            commands::poly::run(&config, &coeffs, use_json)?;
        }
        Commands::Exports { host } => commands::exports::run(host)?,
    }
    Ok(())
}
