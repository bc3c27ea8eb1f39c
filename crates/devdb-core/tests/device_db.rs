//! Integration tests for the DeviceDb public interface.
//!
//! These exercise the registry end to end: adds and deletes across all four
//! access paths, validation, persistence, lifecycle and failure handling.

use devdb::{
    DbStatus, DevDbError, DeviceDb, DeviceDescriptor, DeviceRecord, DeviceType, FieldLimits,
    KvEngine, KvPair, SqliteEngine, StoreConfig,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn sda() -> DeviceDescriptor {
    DeviceDescriptor::new("sda")
        .with_devpath("/block/sda")
        .with_bus("scsi", "0:0:0:0")
        .with_class("block", "sda")
        .with_driver("sd")
        .with_devnum(DeviceType::Block, 8, 0)
        .with_mode(0o660)
}

fn serial(n: u32) -> DeviceDescriptor {
    DeviceDescriptor::new(format!("ttyS{}", n))
        .with_devpath(format!("/class/tty/ttyS{}", n))
        .with_bus("serial", n.to_string())
        .with_class("tty", format!("ttyS{}", n))
        .with_devnum(DeviceType::Char, 4, 64 + n as i32)
}

/// Create a persistent database in a fresh temp directory.
fn create_test_db() -> (TempDir, DeviceDb) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = DeviceDb::open(StoreConfig::persistent(temp_dir.path().join("devdb.sqlite")))
        .expect("Failed to open database");
    (temp_dir, db)
}

#[test]
fn test_sda_scenario() {
    let (_temp, db) = create_test_db();
    db.add_device(&sda()).unwrap();

    let by_bus = db.get_device_by_bus("scsi", "0:0:0:0").unwrap().unwrap();
    assert_eq!(by_bus.name, "sda");
    assert_eq!(by_bus.devpath, "/block/sda");
    assert_eq!(by_bus.dev_type, DeviceType::Block);
    assert_eq!((by_bus.major, by_bus.minor, by_bus.mode), (8, 0, 0o660));
    assert_eq!(
        db.get_device_by_path("/block/sda").unwrap(),
        Some("sda".to_string())
    );

    let removed = db.delete_device("sda").unwrap();
    assert_eq!(removed, Some(by_bus));

    assert_eq!(db.get_device_by_name("sda").unwrap(), None);
    assert_eq!(db.get_device_by_bus("scsi", "0:0:0:0").unwrap(), None);
    assert_eq!(db.get_device_by_class("block", "sda").unwrap(), None);
    assert_eq!(db.get_device_by_path("/block/sda").unwrap(), None);
    assert!(db.check_integrity().unwrap().is_clean());
}

#[test]
fn test_all_paths_resolve_to_same_record() {
    let db = DeviceDb::in_memory().unwrap();
    for n in 0..4 {
        db.add_device(&serial(n)).unwrap();
    }

    for n in 0..4 {
        let name = format!("ttyS{}", n);
        let by_name = db.get_device_by_name(&name).unwrap().unwrap();
        let expected = DeviceRecord::from_descriptor(&serial(n)).unwrap();
        assert_eq!(by_name, expected);
        assert_eq!(
            db.get_device_by_bus("serial", &n.to_string()).unwrap(),
            Some(by_name.clone())
        );
        assert_eq!(
            db.get_device_by_class("tty", &name).unwrap(),
            Some(by_name.clone())
        );
        assert_eq!(
            db.get_device_by_path(&format!("/class/tty/{}", name)).unwrap(),
            Some(name)
        );
    }
}

#[test]
fn test_add_returns_normalized_record() {
    let db = DeviceDb::in_memory().unwrap();
    let record = db.add_device(&DeviceDescriptor::new("null")).unwrap();

    assert!(record.driver.is_unknown());
    assert!(record.bus_name.is_unknown());
    assert_eq!(db.get_device_by_name("null").unwrap(), Some(record));
}

#[test]
fn test_overlong_components_are_rejected_without_writes() {
    let db = DeviceDb::in_memory().unwrap();
    let at = |size: usize| "x".repeat(size);

    let cases = vec![
        ("name", DeviceDescriptor { name: at(FieldLimits::NAME_SIZE), ..sda() }),
        ("bus", sda().with_bus(at(FieldLimits::BUS_SIZE), "0:0:0:0")),
        ("bus_id", sda().with_bus("scsi", at(FieldLimits::ID_SIZE))),
        ("class", sda().with_class(at(FieldLimits::NAME_SIZE), "sda")),
        ("class_dev", sda().with_class("block", at(FieldLimits::NAME_SIZE + 10))),
        ("devpath", sda().with_devpath(at(FieldLimits::PATH_SIZE))),
    ];

    for (field, desc) in cases {
        match db.add_device(&desc) {
            Err(DevDbError::Validation { field: got, .. }) => assert_eq!(got, field),
            other => panic!("{field}: expected validation error, got {other:?}"),
        }
        assert_eq!(db.get_device_by_name("sda").unwrap(), None, "{field}");
    }
    assert!(db.list_devices().unwrap().is_empty());
}

#[test]
fn test_lookup_validation() {
    let db = DeviceDb::in_memory().unwrap();
    let long_id = "1".repeat(FieldLimits::ID_SIZE);

    assert!(db.get_device_by_bus("scsi", &long_id).unwrap_err().is_validation());
    assert!(db.get_device_by_class("", "sda").unwrap_err().is_validation());
    assert!(db.delete_device("").unwrap_err().is_validation());
}

#[test]
fn test_readd_replaces_old_entries() {
    let db = DeviceDb::in_memory().unwrap();
    db.add_device(&sda()).unwrap();

    let moved = sda()
        .with_devpath("/block/sdb")
        .with_bus("scsi", "1:0:0:0")
        .with_class("disk", "sdb");
    let record = db.add_device(&moved).unwrap();

    assert_eq!(db.get_device_by_bus("scsi", "0:0:0:0").unwrap(), None);
    assert_eq!(db.get_device_by_class("block", "sda").unwrap(), None);
    assert_eq!(db.get_device_by_path("/block/sda").unwrap(), None);

    assert_eq!(db.get_device_by_bus("scsi", "1:0:0:0").unwrap(), Some(record.clone()));
    assert_eq!(db.get_device_by_class("disk", "sdb").unwrap(), Some(record));
    assert_eq!(db.list_devices().unwrap().len(), 1);
    assert!(db.check_integrity().unwrap().is_clean());
}

#[test]
fn test_deleting_path_holder_leaves_earlier_device_unreachable_by_path() {
    let db = DeviceDb::in_memory().unwrap();
    db.add_device(&DeviceDescriptor::new("a").with_devpath("/p"))
        .unwrap();
    db.add_device(&DeviceDescriptor::new("b").with_devpath("/p"))
        .unwrap();
    assert_eq!(db.get_device_by_path("/p").unwrap(), Some("b".to_string()));

    assert!(db.delete_device("b").unwrap().is_some());

    let a = db.require_device("a").unwrap();
    assert_eq!(a.devpath, "/p");
    assert_eq!(db.get_device_by_path("/p").unwrap(), None);
    assert!(db.check_integrity().unwrap().is_clean());
}

#[test]
fn test_delete_unknown_device_is_none() {
    let db = DeviceDb::in_memory().unwrap();
    assert_eq!(db.delete_device("sda").unwrap(), None);
    assert!(db.require_device("sda").unwrap_err().is_not_found());
}

#[test]
fn test_list_devices() {
    let db = DeviceDb::in_memory().unwrap();
    db.add_device(&sda()).unwrap();
    db.add_device(&serial(1)).unwrap();
    db.add_device(&serial(0)).unwrap();

    let names: Vec<String> = db
        .list_devices()
        .unwrap()
        .into_iter()
        .map(|d| d.name.into_string())
        .collect();
    assert_eq!(names, vec!["sda", "ttyS0", "ttyS1"]);
}

#[test]
fn test_persistent_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::persistent(temp_dir.path().join("nested").join("devdb.sqlite"));

    let db = DeviceDb::open(config.clone()).unwrap();
    db.add_device(&sda()).unwrap();
    db.close().unwrap();

    let db = DeviceDb::open(config).unwrap();
    assert_eq!(
        db.get_device_by_path("/block/sda").unwrap(),
        Some("sda".to_string())
    );
}

#[test]
fn test_reinit_after_close() {
    let (_temp, db) = create_test_db();
    db.add_device(&sda()).unwrap();
    db.close().unwrap();
    assert_eq!(db.status().unwrap(), DbStatus::Closed);
    assert!(matches!(
        db.get_device_by_name("sda"),
        Err(DevDbError::State { .. })
    ));

    db.init().unwrap();
    assert!(db.get_device_by_name("sda").unwrap().is_some());
}

#[test]
fn test_in_memory_is_not_persisted() {
    let db = DeviceDb::in_memory().unwrap();
    db.add_device(&sda()).unwrap();
    db.close().unwrap();
    db.init().unwrap();
    assert_eq!(db.get_device_by_name("sda").unwrap(), None);
}

#[test]
fn test_init_twice_is_state_error() {
    let (_temp, db) = create_test_db();
    assert!(matches!(db.init(), Err(DevDbError::State { .. })));
}

#[test]
fn test_concurrent_adds_are_serialized() {
    let db = Arc::new(DeviceDb::in_memory().unwrap());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..10 {
                    db.add_device(&serial(t * 10 + i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.list_devices().unwrap().len(), 40);
    let report = db.check_integrity().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.entries_checked, 120);
}

/// When an injected failure fires. Writes succeed until `remaining` runs
/// out; a sticky plan keeps failing afterwards.
#[derive(Default)]
struct FailPlan {
    remaining: AtomicUsize,
    sticky: AtomicBool,
}

impl FailPlan {
    fn arm(&self, writes: usize, sticky: bool) {
        self.sticky.store(sticky, Ordering::SeqCst);
        self.remaining.store(writes, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.arm(usize::MAX, false);
    }
}

struct FailingEngine {
    inner: SqliteEngine,
    plan: Arc<FailPlan>,
}

impl FailingEngine {
    fn write(&self) -> devdb::Result<()> {
        let spent = self
            .plan
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if spent.is_ok() {
            return Ok(());
        }
        if !self.plan.sticky.load(Ordering::SeqCst) {
            self.plan.disarm();
        }
        Err(DevDbError::engine("injected write failure"))
    }
}

impl KvEngine for FailingEngine {
    fn fetch(&self, key: &[u8]) -> devdb::Result<Option<Vec<u8>>> {
        self.inner.fetch(key)
    }

    fn store(&mut self, key: &[u8], value: &[u8]) -> devdb::Result<()> {
        self.write()?;
        self.inner.store(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> devdb::Result<bool> {
        self.write()?;
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> devdb::Result<Vec<KvPair>> {
        self.inner.scan_prefix(prefix)
    }
}

fn failing_db() -> (DeviceDb, Arc<FailPlan>) {
    let plan = Arc::new(FailPlan::default());
    plan.disarm();
    let engine = FailingEngine {
        inner: SqliteEngine::open(&StoreConfig::in_memory()).unwrap(),
        plan: Arc::clone(&plan),
    };
    let db = DeviceDb::with_engine(StoreConfig::in_memory(), Box::new(engine));
    (db, plan)
}

#[test]
fn test_engine_failure_mid_add_rolls_back() {
    let (db, plan) = failing_db();
    // Bus and class entries are written, the path entry fails.
    plan.arm(2, false);

    let err = db.add_device(&sda()).unwrap_err();
    assert!(err.is_engine(), "{err}");

    let report = db.check_integrity().unwrap();
    assert_eq!(report.records_checked + report.entries_checked, 0);
    assert_eq!(db.get_device_by_bus("scsi", "0:0:0:0").unwrap(), None);
}

#[test]
fn test_engine_failure_without_rollback_is_inconsistency() {
    let (db, plan) = failing_db();
    db.add_device(&sda()).unwrap();

    // The bus entry removal goes through, then the engine stops writing.
    plan.arm(1, true);
    let err = db.delete_device("sda").unwrap_err();
    match &err {
        DevDbError::Inconsistency { operation, keys, .. } => {
            assert_eq!(operation, "delete_device");
            assert_eq!(keys.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 6);

    plan.disarm();
    assert!(db.get_device_by_name("sda").unwrap().is_some());
    assert_eq!(db.get_device_by_bus("scsi", "0:0:0:0").unwrap(), None);
    assert!(db.get_device_by_class("block", "sda").unwrap().is_some());
}

fn component() -> impl Strategy<Value = String> {
    "[a-z0-9:/._-]{1,20}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_add_get_delete(
        name in component(),
        bus in component(),
        id in component(),
        class in component(),
        class_dev in component(),
        path in component(),
        major in 0i32..512,
        minor in 0i32..512,
    ) {
        let db = DeviceDb::in_memory().unwrap();
        let desc = DeviceDescriptor::new(name.clone())
            .with_bus(bus.clone(), id.clone())
            .with_class(class.clone(), class_dev.clone())
            .with_devpath(path.clone())
            .with_devnum(DeviceType::Char, major, minor);

        let stored = db.add_device(&desc).unwrap();
        prop_assert_eq!(&stored, &DeviceRecord::from_descriptor(&desc).unwrap());
        prop_assert_eq!(db.get_device_by_name(&name).unwrap(), Some(stored.clone()));
        prop_assert_eq!(db.get_device_by_bus(&bus, &id).unwrap(), Some(stored.clone()));
        prop_assert_eq!(db.get_device_by_class(&class, &class_dev).unwrap(), Some(stored.clone()));
        prop_assert_eq!(db.get_device_by_path(&path).unwrap(), Some(name.clone()));

        prop_assert_eq!(db.delete_device(&name).unwrap(), Some(stored));
        prop_assert_eq!(db.get_device_by_name(&name).unwrap(), None);
        prop_assert_eq!(db.get_device_by_bus(&bus, &id).unwrap(), None);
        prop_assert_eq!(db.get_device_by_class(&class, &class_dev).unwrap(), None);
        prop_assert_eq!(db.get_device_by_path(&path).unwrap(), None);
    }
}
