//! devdb - command-line front end for the device registry.
//!
//! Adds, looks up, deletes and lists devices in a devdb database, and runs
//! the integrity check. Logs go to stderr; results go to stdout, as JSON
//! with `--json`.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use devdb::{DevDbError, DeviceType, StoreConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "devdb")]
#[command(about = "Persistent multi-index device registry")]
#[command(version)]
struct Cli {
    /// Database file (defaults to $DEVDB_PATH, then the platform data dir)
    #[arg(long, global = true, conflicts_with = "in_memory")]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true)]
    in_memory: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add or replace a device
    Add(AddArgs),
    /// Look a device up by one of its access paths
    Get(GetTarget),
    /// Delete a device and its index entries
    Delete {
        /// Device name
        name: String,
    },
    /// List all devices
    List,
    /// Check index entries against device records
    Check,
}

#[derive(Args, Debug)]
struct AddArgs {
    /// Device name (primary key)
    #[arg(long)]
    name: String,

    /// Topology path
    #[arg(long)]
    devpath: Option<String>,

    /// Bus name and bus id
    #[arg(long, num_args = 2, value_names = ["BUS", "ID"])]
    bus: Option<Vec<String>>,

    /// Class name and class device name
    #[arg(long, num_args = 2, value_names = ["CLASS", "CLASS_DEV"])]
    class: Option<Vec<String>>,

    /// Driver name
    #[arg(long)]
    driver: Option<String>,

    /// Device node type
    #[arg(long = "type", value_enum, default_value = "unknown")]
    dev_type: TypeArg,

    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    major: i32,

    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    minor: i32,

    /// Access mode, in octal
    #[arg(long, default_value = "0", value_parser = parse_octal)]
    mode: u32,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct GetTarget {
    /// Device name
    #[arg(long)]
    name: Option<String>,

    /// Bus name and bus id
    #[arg(long, num_args = 2, value_names = ["BUS", "ID"])]
    bus: Option<Vec<String>>,

    /// Class name and class device name
    #[arg(long, num_args = 2, value_names = ["CLASS", "CLASS_DEV"])]
    class: Option<Vec<String>>,

    /// Topology path (prints the device name)
    #[arg(long)]
    path: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TypeArg {
    Block,
    Char,
    Unknown,
}

impl From<TypeArg> for DeviceType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Block => DeviceType::Block,
            TypeArg::Char => DeviceType::Char,
            TypeArg::Unknown => DeviceType::Unknown,
        }
    }
}

fn parse_octal(s: &str) -> std::result::Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode '{}': {}", s, e))
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        if self.in_memory {
            return Ok(StoreConfig::in_memory());
        }
        match &self.db {
            Some(path) => Ok(StoreConfig::persistent(path)),
            None => Ok(StoreConfig::from_env()?),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<DevDbError>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = cli
        .store_config()
        .and_then(|config| {
            debug!("Using {} store at {}", config.mode, config.db_path.display());
            commands::run(config, &cli.command, cli.json)
        });

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("devdb: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}
