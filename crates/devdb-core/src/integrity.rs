//! Read-only consistency walk over the whole store.

use crate::bounded::BoundedStr;
use crate::codec;
use crate::error::{DevDbError, Result};
use crate::key::StoreKey;
use crate::lookup::check_record;
use crate::models::DeviceRecord;
use crate::store::KvEngine;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// Index entry whose target device has no readable record.
    Dangling,
    /// Index entry whose target record no longer carries that key.
    Stale,
    /// Key or value that does not decode.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub key: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub records_checked: usize,
    pub entries_checked: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, kind: IssueKind, key: &StoreKey, detail: impl Into<String>) {
        self.issues.push(IntegrityIssue {
            kind,
            key: key.to_string(),
            detail: detail.into(),
        });
    }
}

/// Walk every key and report what does not add up. Nothing is repaired.
pub fn check_integrity(engine: &dyn KvEngine) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();
    let mut records: HashMap<BoundedStr, DeviceRecord> = HashMap::new();
    let mut entries = Vec::new();

    for (key, value) in engine.scan_prefix(&[])? {
        let key = StoreKey::from_bytes(key);
        let kind = match key.decode_parts() {
            Ok((kind, _)) => kind,
            Err(e) => {
                report.push(IssueKind::Corrupt, &key, e.to_string());
                continue;
            }
        };

        match kind.index_kind() {
            None => {
                report.records_checked += 1;
                match check_record(&key, &value) {
                    Ok(record) => {
                        records.insert(record.name.clone(), record);
                    }
                    Err(e @ (DevDbError::Decode { .. } | DevDbError::Inconsistency { .. })) => {
                        report.push(IssueKind::Corrupt, &key, e.to_string());
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(index_kind) => entries.push((index_kind, key, value)),
        }
    }

    for (kind, key, value) in entries {
        report.entries_checked += 1;
        let entry = match codec::decode_entry(kind, &value) {
            Ok(entry) => entry,
            Err(e) => {
                report.push(IssueKind::Corrupt, &key, e.to_string());
                continue;
            }
        };

        match records.get(&entry.device) {
            None => report.push(
                IssueKind::Dangling,
                &key,
                format!("references device '{}' which has no record", entry.device),
            ),
            Some(record) if StoreKey::index(record, kind) != key => report.push(
                IssueKind::Stale,
                &key,
                format!(
                    "device '{}' is now at {}",
                    entry.device,
                    StoreKey::index(record, kind)
                ),
            ),
            Some(_) => {}
        }
    }

    Ok(report)
}
