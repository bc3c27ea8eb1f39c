//! Lookup Service: resolve any of the four access paths to a device.
//!
//! Secondary lookups go key -> index entry -> device name -> canonical
//! record. An entry whose target record is missing is reported as an
//! `Inconsistency`, never as a plain miss.

use crate::bounded::{BoundedStr, Field};
use crate::codec;
use crate::error::{DevDbError, Result};
use crate::key::{KeyBuilder, KeyKind, StoreKey};
use crate::models::{DeviceRecord, IndexEntry, IndexKind};
use crate::store::KvEngine;
use tracing::debug;

/// Read-only view over an engine.
pub struct LookupService<'a> {
    engine: &'a dyn KvEngine,
}

impl<'a> LookupService<'a> {
    pub fn new(engine: &'a dyn KvEngine) -> Self {
        Self { engine }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<DeviceRecord>> {
        let name = BoundedStr::new(Field::Name, name)?;
        self.record(&name)
    }

    pub fn get_by_bus(&self, bus: &str, bus_id: &str) -> Result<Option<DeviceRecord>> {
        let key = KeyBuilder::build(KeyKind::Bus, &[bus, bus_id])?;
        self.resolve(IndexKind::Bus, &key)
    }

    pub fn get_by_class(&self, class: &str, class_dev: &str) -> Result<Option<DeviceRecord>> {
        let key = KeyBuilder::build(KeyKind::Class, &[class, class_dev])?;
        self.resolve(IndexKind::Class, &key)
    }

    /// Resolve a topology path to the name of the device living there.
    ///
    /// Only the name is returned, but the record it names must exist.
    pub fn get_by_path(&self, devpath: &str) -> Result<Option<String>> {
        let key = KeyBuilder::build(KeyKind::Path, &[devpath])?;
        Ok(self
            .resolve(IndexKind::Path, &key)?
            .map(|record| record.name.into_string()))
    }

    /// All stored records, sorted by name.
    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let prefix = StoreKey::kind_prefix(KeyKind::Name);
        let mut records = Vec::new();
        for (key, value) in self.engine.scan_prefix(&prefix)? {
            records.push(check_record(&StoreKey::from_bytes(key), &value)?);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    pub(crate) fn record(&self, name: &BoundedStr) -> Result<Option<DeviceRecord>> {
        let key = StoreKey::name(name);
        match self.engine.fetch(key.as_bytes())? {
            Some(bytes) => check_record(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn entry(&self, kind: IndexKind, key: &StoreKey) -> Result<Option<IndexEntry>> {
        match self.engine.fetch(key.as_bytes())? {
            Some(bytes) => codec::decode_entry(kind, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn resolve(&self, kind: IndexKind, key: &StoreKey) -> Result<Option<DeviceRecord>> {
        let Some(entry) = self.entry(kind, key)? else {
            debug!("No {} entry for {}", kind, key);
            return Ok(None);
        };

        match self.record(&entry.device)? {
            Some(record) => Ok(Some(record)),
            None => Err(DevDbError::Inconsistency {
                operation: format!("lookup by {}", kind),
                keys: vec![key.to_string()],
                message: format!("entry references missing device '{}'", entry.device),
            }),
        }
    }
}

/// Decode a primary record and check it is stored under its own name.
pub(crate) fn check_record(key: &StoreKey, bytes: &[u8]) -> Result<DeviceRecord> {
    let record = codec::decode_record(bytes)?;
    if StoreKey::name(&record.name) != *key {
        return Err(DevDbError::Inconsistency {
            operation: "lookup by name".to_string(),
            keys: vec![key.to_string()],
            message: format!("record stored under this key is named '{}'", record.name),
        });
    }
    Ok(record)
}
