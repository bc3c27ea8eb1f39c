//! Platform path helpers.

use crate::config::DbConfig;
use crate::error::{DevDbError, Result};
use std::path::PathBuf;

/// Get the platform data directory for devdb.
///
/// - **Linux**: `~/.local/share/devdb`
/// - **macOS**: `~/Library/Application Support/devdb`
/// - **Windows**: `%LOCALAPPDATA%\devdb`
pub fn devdb_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir().ok_or_else(|| DevDbError::Config {
        message: "Could not determine platform data directory".to_string(),
    })?;
    Ok(data_dir.join(DbConfig::APP_DIR_NAME))
}

/// Get the path to the default persistent database.
///
/// Returns `{devdb_data_dir}/devdb.sqlite`.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(devdb_data_dir()?.join(DbConfig::DB_FILENAME))
}
