//! Index Manager.
//!
//! The engine only commits single keys, so a device update spanning the
//! primary record and three index entries is applied as a staged commit
//! that can undo itself.

mod commit;
mod manager;

pub use manager::IndexManager;
