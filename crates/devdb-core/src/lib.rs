//! devdb - Persistent multi-index device registry.
//!
//! Stores one canonical record per hardware device and keeps it reachable
//! by four access paths: device name, (bus, bus id), (class, class device)
//! and topology path. The backing engine is SQLite used as a plain
//! byte-key/byte-value store; consistency across the four key spaces is
//! kept by staged commits that roll themselves back on failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use devdb::{DeviceDb, DeviceDescriptor, DeviceType, StoreConfig};
//!
//! fn main() -> devdb::Result<()> {
//!     let db = DeviceDb::open(StoreConfig::persistent("/var/lib/devdb/devdb.sqlite"))?;
//!
//!     db.add_device(
//!         &DeviceDescriptor::new("sda")
//!             .with_devpath("/block/sda")
//!             .with_bus("scsi", "0:0:0:0")
//!             .with_class("block", "sda")
//!             .with_devnum(DeviceType::Block, 8, 0),
//!     )?;
//!
//!     let by_bus = db.get_device_by_bus("scsi", "0:0:0:0")?;
//!     assert_eq!(by_bus.map(|d| d.major), Some(8));
//!     assert_eq!(db.get_device_by_path("/block/sda")?.as_deref(), Some("sda"));
//!
//!     db.close()
//! }
//! ```

pub mod bounded;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod key;
pub mod lookup;
pub mod models;
pub mod paths;
pub mod store;

mod db;

pub use bounded::{BoundedStr, Field};
pub use config::{DbConfig, FieldLimits, StoreConfig, StoreMode};
pub use db::{DbStatus, DeviceDb};
pub use error::{DevDbError, Result};
pub use index::IndexManager;
pub use integrity::{IntegrityIssue, IntegrityReport, IssueKind};
pub use key::{KeyBuilder, KeyKind, StoreKey};
pub use lookup::LookupService;
pub use models::{DeviceDescriptor, DeviceRecord, DeviceType, IndexEntry, IndexKind};
pub use store::{KvEngine, KvPair, SqliteEngine};
