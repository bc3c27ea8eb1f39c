//! The device database handle.

use crate::config::StoreConfig;
use crate::error::{DevDbError, Result};
use crate::index::IndexManager;
use crate::integrity::{self, IntegrityReport};
use crate::lookup::LookupService;
use crate::models::{DeviceDescriptor, DeviceRecord};
use crate::store::{KvEngine, SqliteEngine};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Lifecycle of a [`DeviceDb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Uninitialized,
    Open,
    Closed,
}

enum DbState {
    Uninitialized,
    Open(Box<dyn KvEngine>),
    Closed,
}

impl DbState {
    fn status(&self) -> DbStatus {
        match self {
            DbState::Uninitialized => DbStatus::Uninitialized,
            DbState::Open(_) => DbStatus::Open,
            DbState::Closed => DbStatus::Closed,
        }
    }
}

/// Persistent multi-index device registry.
///
/// Owns one key-value engine behind a mutex. Every operation holds the lock
/// for its whole multi-key sequence, so concurrent callers sharing the
/// handle through an `Arc` are serialized.
///
/// A handle starts `Uninitialized`; [`init`](Self::init) opens the engine
/// and [`close`](Self::close) releases it. A closed handle can be
/// initialized again.
pub struct DeviceDb {
    config: StoreConfig,
    state: Mutex<DbState>,
}

impl DeviceDb {
    /// Create an uninitialized handle.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DbState::Uninitialized),
        }
    }

    /// Create a handle and open it.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let db = Self::new(config);
        db.init()?;
        Ok(db)
    }

    /// Open a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Wrap an already-open engine.
    ///
    /// `config` is only reported back; it is not used to reopen the engine
    /// after [`close`](Self::close).
    pub fn with_engine(config: StoreConfig, engine: Box<dyn KvEngine>) -> Self {
        Self {
            config,
            state: Mutex::new(DbState::Open(engine)),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn status(&self) -> Result<DbStatus> {
        Ok(self.lock_state()?.status())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, DbState>> {
        self.state
            .lock()
            .map_err(|_| DevDbError::state("Device database lock poisoned"))
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Open the engine in the configured mode.
    ///
    /// Fails with `State` if the handle is already open.
    pub fn init(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        if let DbState::Open(_) = *state {
            return Err(DevDbError::state("Device database is already open"));
        }

        let engine = SqliteEngine::open(&self.config)?;
        *state = DbState::Open(Box::new(engine));
        info!("Opened {} device database", self.config.mode);
        Ok(())
    }

    /// Release the engine. Closing a handle that is not open does nothing.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        match std::mem::replace(&mut *state, DbState::Closed) {
            DbState::Open(engine) => {
                engine.close()?;
                debug!("Closed device database");
            }
            DbState::Uninitialized => *state = DbState::Uninitialized,
            DbState::Closed => {}
        }
        Ok(())
    }

    fn with_engine_ref<T>(&self, f: impl FnOnce(&dyn KvEngine) -> Result<T>) -> Result<T> {
        let state = self.lock_state()?;
        match &*state {
            DbState::Open(engine) => f(&**engine),
            other => Err(not_open(other.status())),
        }
    }

    fn with_engine_mut<T>(&self, f: impl FnOnce(&mut dyn KvEngine) -> Result<T>) -> Result<T> {
        let mut state = self.lock_state()?;
        match &mut *state {
            DbState::Open(engine) => f(&mut **engine),
            other => Err(not_open(other.status())),
        }
    }

    // ========================================
    // Mutations
    // ========================================

    /// Store a device under its name with its bus, class and path entries.
    ///
    /// An existing device of the same name is replaced wholesale. Returns
    /// the normalized record that was stored.
    pub fn add_device(&self, descriptor: &DeviceDescriptor) -> Result<DeviceRecord> {
        self.with_engine_mut(|engine| IndexManager::new(engine).add_device(descriptor))
            .inspect_err(|e| log_failure("add_device", e))
    }

    /// Remove a device and its index entries.
    ///
    /// Returns the removed record, or `None` if there was no such device.
    pub fn delete_device(&self, name: &str) -> Result<Option<DeviceRecord>> {
        self.with_engine_mut(|engine| IndexManager::new(engine).delete_device(name))
            .inspect_err(|e| log_failure("delete_device", e))
    }

    // ========================================
    // Lookups
    // ========================================

    pub fn get_device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>> {
        self.with_engine_ref(|engine| LookupService::new(engine).get_by_name(name))
    }

    pub fn get_device_by_bus(&self, bus: &str, bus_id: &str) -> Result<Option<DeviceRecord>> {
        self.with_engine_ref(|engine| LookupService::new(engine).get_by_bus(bus, bus_id))
    }

    pub fn get_device_by_class(
        &self,
        class: &str,
        class_dev: &str,
    ) -> Result<Option<DeviceRecord>> {
        self.with_engine_ref(|engine| LookupService::new(engine).get_by_class(class, class_dev))
    }

    /// Name of the device at a topology path.
    pub fn get_device_by_path(&self, devpath: &str) -> Result<Option<String>> {
        self.with_engine_ref(|engine| LookupService::new(engine).get_by_path(devpath))
    }

    /// Like [`get_device_by_name`](Self::get_device_by_name), with a miss
    /// reported as `NotFound`.
    pub fn require_device(&self, name: &str) -> Result<DeviceRecord> {
        self.get_device_by_name(name)?
            .ok_or_else(|| DevDbError::NotFound {
                kind: "name".to_string(),
                key: name.to_string(),
            })
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        self.with_engine_ref(|engine| LookupService::new(engine).list_devices())
    }

    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let report = self.with_engine_ref(integrity::check_integrity)?;
        if !report.is_clean() {
            warn!("Integrity check found {} issue(s)", report.issues.len());
        }
        Ok(report)
    }
}

fn not_open(status: DbStatus) -> DevDbError {
    match status {
        DbStatus::Uninitialized => DevDbError::state("Device database is not initialized"),
        _ => DevDbError::state("Device database is closed"),
    }
}

fn log_failure(operation: &str, err: &DevDbError) {
    // Inconsistencies are already logged where they are raised.
    if !err.is_validation() && !err.is_inconsistency() {
        warn!("{} failed: {}", operation, err);
    }
}
