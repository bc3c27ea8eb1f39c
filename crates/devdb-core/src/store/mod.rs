//! Key-value engine adapter.
//!
//! The registry treats its storage engine as an opaque byte-key/byte-value
//! store with fetch, replace-store and delete. [`KvEngine`] is that
//! contract; [`SqliteEngine`] implements it over a single SQLite table,
//! either file-backed or in memory.

#[cfg(test)]
pub(crate) mod faulty;
mod sqlite;
mod traits;

pub use sqlite::SqliteEngine;
pub use traits::{KvEngine, KvPair};
