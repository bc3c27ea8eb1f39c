//! Engine trait.

use crate::error::Result;

/// One key/value pair returned by a prefix scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Opaque key-value engine.
///
/// Each call commits (or fails) on its own; there is no multi-key
/// transaction. All operations are synchronous and block until the engine
/// answers.
pub trait KvEngine: Send {
    /// Fetch the value stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    fn fetch(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    ///
    /// Overwrites any existing value with the same key.
    fn store(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete `key`.
    ///
    /// Returns `false` if the key did not exist.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    /// All pairs whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<KvPair>>;

    /// Release the engine.
    ///
    /// In-memory engines discard their contents here.
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
