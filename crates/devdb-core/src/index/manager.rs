//! Add and delete across the four key spaces.

use super::commit::StagedCommit;
use crate::bounded::{BoundedStr, Field};
use crate::codec;
use crate::error::{DevDbError, Result};
use crate::key::StoreKey;
use crate::lookup::LookupService;
use crate::models::{DeviceDescriptor, DeviceRecord, IndexEntry, IndexKind};
use crate::store::KvEngine;
use tracing::{debug, warn};

/// Keeps the primary record and its three index entries in step.
///
/// Every mutation goes through a [`StagedCommit`], so an engine failure
/// part-way leaves the store as it was or surfaces an `Inconsistency`.
/// Secondary keys are only ever removed by the device they reference.
pub struct IndexManager<'a> {
    engine: &'a mut dyn KvEngine,
}

impl<'a> IndexManager<'a> {
    pub fn new(engine: &'a mut dyn KvEngine) -> Self {
        Self { engine }
    }

    /// Store a device and its index entries, replacing any previous record
    /// under the same name.
    ///
    /// Entries are written before the primary record. Old entries that no
    /// longer match the new record are removed last.
    pub fn add_device(&mut self, descriptor: &DeviceDescriptor) -> Result<DeviceRecord> {
        let record = DeviceRecord::from_descriptor(descriptor)?;
        let previous = self.previous_record(&record.name)?;

        let mut commit = StagedCommit::new("add_device");
        for kind in IndexKind::ALL {
            let entry = IndexEntry::new(kind, record.name.clone());
            commit.put(StoreKey::index(&record, kind), codec::encode_entry(&entry));
        }
        commit.put(StoreKey::name(&record.name), codec::encode_record(&record));

        if let Some(old) = &previous {
            for kind in IndexKind::ALL {
                let old_key = StoreKey::index(old, kind);
                if old_key != StoreKey::index(&record, kind)
                    && self.owned_by(kind, &old_key, &record.name)?
                {
                    commit.remove(old_key);
                }
            }
        }

        commit.apply(&mut *self.engine)?;

        debug!(
            "{} device {}",
            if previous.is_some() { "Replaced" } else { "Added" },
            record.name
        );
        Ok(record)
    }

    /// Remove a device and the index entries that still point at it.
    ///
    /// Returns the removed record, or `None` if no device has that name.
    /// An unreadable record under `name` is removed on its own and also
    /// yields `None`; its index entries cannot be known.
    pub fn delete_device(&mut self, name: &str) -> Result<Option<DeviceRecord>> {
        let name = BoundedStr::new(Field::Name, name)?;
        let record = match LookupService::new(&*self.engine).record(&name) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Delete of unknown device {}", name);
                return Ok(None);
            }
            Err(e @ (DevDbError::Decode { .. } | DevDbError::Inconsistency { .. })) => {
                warn!("Removing unreadable record for {}: {}", name, e);
                let mut commit = StagedCommit::new("delete_device");
                commit.remove(StoreKey::name(&name));
                commit.apply(&mut *self.engine)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut commit = StagedCommit::new("delete_device");
        for kind in IndexKind::ALL {
            let key = StoreKey::index(&record, kind);
            if self.owned_by(kind, &key, &name)? {
                commit.remove(key);
            }
        }
        commit.remove(StoreKey::name(&name));

        let removed = commit.len();
        commit.apply(&mut *self.engine)?;

        debug!("Deleted device {} ({} keys)", name, removed);
        Ok(Some(record))
    }

    // A corrupt or misfiled previous record is overwritten; its old index
    // keys are unknown, so nothing beyond the new keys is cleaned up.
    fn previous_record(&self, name: &BoundedStr) -> Result<Option<DeviceRecord>> {
        match LookupService::new(&*self.engine).record(name) {
            Ok(previous) => Ok(previous),
            Err(e @ (DevDbError::Decode { .. } | DevDbError::Inconsistency { .. })) => {
                warn!("Overwriting unreadable record for {}: {}", name, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the entry at `key` currently references `name`.
    ///
    /// A missing entry is not owned. An undecodable one is left in place
    /// for the integrity check to report.
    fn owned_by(&self, kind: IndexKind, key: &StoreKey, name: &BoundedStr) -> Result<bool> {
        match LookupService::new(&*self.engine).entry(kind, key) {
            Ok(Some(entry)) => Ok(entry.references(name)),
            Ok(None) => Ok(false),
            Err(DevDbError::Decode { message, .. }) => {
                warn!("Leaving undecodable {} entry at {}: {}", kind, key, message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
