//! SQLite-backed key-value engine.

use super::traits::{KvEngine, KvPair};
use crate::config::{DbConfig, StoreConfig, StoreMode};
use crate::error::{DevDbError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Key-value engine over one SQLite table.
///
/// SQLite is used only as a byte store: one `kv` table with a BLOB primary
/// key. Every statement runs in autocommit mode, so each call is its own
/// single-key commit.
pub struct SqliteEngine {
    conn: Connection,
    mode: StoreMode,
}

impl SqliteEngine {
    /// Open the engine described by `config`.
    ///
    /// `Persistent` creates the database file and its parent directories if
    /// they don't exist. `InMemory` never touches storage media.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = match config.mode {
            StoreMode::Persistent => Self::open_file(&config.db_path)?,
            StoreMode::InMemory => Connection::open_in_memory().map_err(|e| DevDbError::Engine {
                message: format!("Failed to initialize in-memory database: {}", e),
                source: Some(e),
            })?,
        };

        Self::ensure_schema(&conn)?;
        debug!("Opened {} key-value engine", config.mode);

        Ok(Self {
            conn,
            mode: config.mode,
        })
    }

    fn open_file(db_path: &Path) -> Result<Connection> {
        if db_path.as_os_str().is_empty() {
            return Err(DevDbError::Config {
                message: "Persistent mode requires a database path".to_string(),
            });
        }

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| DevDbError::Io {
                    message: format!("Failed to create database directory: {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| DevDbError::Engine {
            message: format!(
                "Unable to initialize database at {}: {}",
                db_path.display(),
                e
            ),
            source: Some(e),
        })?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            DbConfig::BUSY_TIMEOUT_MS,
        ))
        .map_err(|e| DevDbError::Engine {
            message: format!("Failed to set pragmas: {}", e),
            source: Some(e),
        })?;

        Ok(conn)
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            ) WITHOUT ROWID;",
        )
        .map_err(|e| DevDbError::Engine {
            message: format!("Failed to initialize schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Close the connection, surfacing any error SQLite reports.
    ///
    /// Dropping the engine also closes it, but silently.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| DevDbError::Engine {
            message: format!("Failed to close database: {}", e),
            source: Some(e),
        })
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when no such bound exists (empty or all-`0xFF` prefix).
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return Some(bound);
        }
    }
    None
}

impl KvEngine for SqliteEngine {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| DevDbError::Engine {
                message: format!("Failed to fetch key: {}", e),
                source: Some(e),
            })
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| DevDbError::Engine {
                message: format!("Failed to store key: {}", e),
                source: Some(e),
            })?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| DevDbError::Engine {
                message: format!("Failed to delete key: {}", e),
                source: Some(e),
            })?;
        Ok(rows > 0)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let map_err = |e: rusqlite::Error| DevDbError::Engine {
            message: format!("Failed to scan keys: {}", e),
            source: Some(e),
        };

        let mut pairs = Vec::new();
        match prefix_upper_bound(prefix) {
            Some(upper) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key")
                    .map_err(map_err)?;
                let rows = stmt
                    .query_map(params![prefix, upper], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(map_err)?;
                for row in rows {
                    pairs.push(row.map_err(map_err)?);
                }
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")
                    .map_err(map_err)?;
                let rows = stmt
                    .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(map_err)?;
                for row in rows {
                    pairs.push(row.map_err(map_err)?);
                }
            }
        }

        Ok(pairs)
    }

    fn close(self: Box<Self>) -> Result<()> {
        SqliteEngine::close(*self)
    }
}
