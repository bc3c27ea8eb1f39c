//! Centralized configuration for devdb.
//!
//! Field capacities, database location defaults and the store mode.

use crate::error::{DevDbError, Result};
use std::path::PathBuf;

/// Database-level configuration.
pub struct DbConfig;

impl DbConfig {
    pub const APP_DIR_NAME: &'static str = "devdb";
    pub const DB_FILENAME: &'static str = "devdb.sqlite";
    pub const BUSY_TIMEOUT_MS: u32 = 5_000;
    /// Environment variable overriding the persistent database path.
    pub const ENV_DB_PATH: &'static str = "DEVDB_PATH";
    /// Environment variable selecting the store mode.
    pub const ENV_MODE: &'static str = "DEVDB_MODE";
}

/// Fixed capacities of the stored string fields.
///
/// Capacity includes the terminator slot of the fixed-width layout, so a
/// value must be strictly shorter than its capacity.
pub struct FieldLimits;

impl FieldLimits {
    pub const NAME_SIZE: usize = 100;
    pub const PATH_SIZE: usize = 256;
    pub const BUS_SIZE: usize = 30;
    pub const ID_SIZE: usize = 50;
}

/// Where the engine keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreMode {
    /// Bound to an on-disk database file.
    #[default]
    Persistent,
    /// Never touches storage media; discarded on close.
    InMemory,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreMode::Persistent => "persistent",
            StoreMode::InMemory => "memory",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "persistent" | "default" | "file" => Some(StoreMode::Persistent),
            "memory" | "in-memory" | "internal" => Some(StoreMode::InMemory),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store configuration handed to `DeviceDb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub mode: StoreMode,
    /// Database file for `Persistent` mode. Ignored for `InMemory`.
    pub db_path: PathBuf,
}

impl StoreConfig {
    /// Persistent store at an explicit path.
    pub fn persistent(db_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: StoreMode::Persistent,
            db_path: db_path.into(),
        }
    }

    /// Ephemeral in-memory store.
    pub fn in_memory() -> Self {
        Self {
            mode: StoreMode::InMemory,
            db_path: PathBuf::new(),
        }
    }

    /// Persistent store at the platform default location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::persistent(crate::paths::default_db_path()?))
    }

    /// Build from `DEVDB_MODE` / `DEVDB_PATH`, falling back to the default
    /// persistent location.
    pub fn from_env() -> Result<Self> {
        let mode = match std::env::var(DbConfig::ENV_MODE) {
            Ok(value) => StoreMode::parse(&value).ok_or_else(|| DevDbError::Config {
                message: format!("Unknown {} value: {}", DbConfig::ENV_MODE, value),
            })?,
            Err(_) => StoreMode::Persistent,
        };

        if mode == StoreMode::InMemory {
            return Ok(Self::in_memory());
        }

        match std::env::var_os(DbConfig::ENV_DB_PATH) {
            Some(path) if !path.is_empty() => Ok(Self::persistent(path)),
            _ => Self::default_location(),
        }
    }
}
