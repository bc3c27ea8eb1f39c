//! Failure-injecting engine for exercising rollback paths in tests.

use super::sqlite::SqliteEngine;
use super::traits::{KvEngine, KvPair};
use crate::config::StoreConfig;
use crate::error::{DevDbError, Result};

/// In-memory engine that fails a chosen write.
///
/// After `writes_before_failure` successful writes (stores and deletes
/// count alike) the next write fails. With `fail_forever` every later write
/// fails too, which makes rollback impossible.
pub(crate) struct FaultyEngine {
    inner: SqliteEngine,
    pub writes_before_failure: Option<usize>,
    pub fail_forever: bool,
    writes: usize,
    tripped: bool,
}

impl FaultyEngine {
    pub fn new() -> Self {
        Self {
            inner: SqliteEngine::open(&StoreConfig::in_memory()).expect("in-memory engine"),
            writes_before_failure: None,
            fail_forever: false,
            writes: 0,
            tripped: false,
        }
    }

    /// Arm the engine: the write after the next `writes` successful ones fails.
    pub fn fail_after(&mut self, writes: usize, forever: bool) {
        self.writes = 0;
        self.tripped = false;
        self.writes_before_failure = Some(writes);
        self.fail_forever = forever;
    }

    pub fn disarm(&mut self) {
        self.writes_before_failure = None;
        self.fail_forever = false;
        self.tripped = false;
    }

    fn check_write(&mut self) -> Result<()> {
        if self.tripped && self.fail_forever {
            return Err(DevDbError::engine("injected failure (persistent)"));
        }
        if let Some(limit) = self.writes_before_failure {
            if !self.tripped && self.writes >= limit {
                self.tripped = true;
                return Err(DevDbError::engine("injected failure"));
            }
        }
        self.writes += 1;
        Ok(())
    }
}

impl KvEngine for FaultyEngine {
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.fetch(key)
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_write()?;
        self.inner.store(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.check_write()?;
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>> {
        self.inner.scan_prefix(prefix)
    }
}
