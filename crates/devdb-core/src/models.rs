//! Device descriptors, canonical records and index entries.

use crate::bounded::{BoundedStr, Field};
use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Device node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Block,
    Char,
    #[default]
    Unknown,
}

impl DeviceType {
    /// Single-character tag used in the stored record.
    pub const fn as_char(self) -> char {
        match self {
            DeviceType::Block => 'b',
            DeviceType::Char => 'c',
            DeviceType::Unknown => 'u',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'b' => Some(DeviceType::Block),
            'c' => Some(DeviceType::Char),
            'u' => Some(DeviceType::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// What the device enumerator knows about a device.
///
/// Absent (or empty) optional fields are stored as `"unknown"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub devpath: Option<String>,
    pub class_dev_name: Option<String>,
    pub class_name: Option<String>,
    pub bus_name: Option<String>,
    pub bus_id: Option<String>,
    pub driver: Option<String>,
    pub dev_type: DeviceType,
    pub major: i32,
    pub minor: i32,
    pub mode: u32,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_devpath(mut self, devpath: impl Into<String>) -> Self {
        self.devpath = Some(devpath.into());
        self
    }

    pub fn with_bus(mut self, bus: impl Into<String>, id: impl Into<String>) -> Self {
        self.bus_name = Some(bus.into());
        self.bus_id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>, class_dev: impl Into<String>) -> Self {
        self.class_name = Some(class.into());
        self.class_dev_name = Some(class_dev.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_devnum(mut self, dev_type: DeviceType, major: i32, minor: i32) -> Self {
        self.dev_type = dev_type;
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// The canonical record for one device, keyed by `name`.
///
/// All string fields are bounded, so a `DeviceRecord` always fits the
/// fixed-width stored layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub name: BoundedStr,
    pub devpath: BoundedStr,
    pub class_dev_name: BoundedStr,
    pub class_name: BoundedStr,
    pub bus_name: BoundedStr,
    pub bus_id: BoundedStr,
    pub driver: BoundedStr,
    pub dev_type: DeviceType,
    pub major: i32,
    pub minor: i32,
    pub mode: u32,
}

impl DeviceRecord {
    /// Normalize a descriptor into its canonical record.
    ///
    /// Fails with `Validation` on the first field that is over its ceiling
    /// or contains a NUL byte.
    pub fn from_descriptor(desc: &DeviceDescriptor) -> Result<Self> {
        let optional = |field: Field, value: &Option<String>| {
            BoundedStr::or_unknown(field, value.as_deref().filter(|v| !v.is_empty()))
        };

        Ok(Self {
            name: BoundedStr::new(Field::Name, desc.name.as_str())?,
            devpath: optional(Field::DevPath, &desc.devpath)?,
            class_dev_name: optional(Field::ClassDevName, &desc.class_dev_name)?,
            class_name: optional(Field::ClassName, &desc.class_name)?,
            bus_name: optional(Field::BusName, &desc.bus_name)?,
            bus_id: optional(Field::BusId, &desc.bus_id)?,
            driver: optional(Field::Driver, &desc.driver)?,
            dev_type: desc.dev_type,
            major: desc.major,
            minor: desc.minor,
            mode: desc.mode,
        })
    }
}

/// The three secondary index spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Bus,
    Class,
    Path,
}

impl IndexKind {
    pub const ALL: [IndexKind; 3] = [IndexKind::Bus, IndexKind::Class, IndexKind::Path];

    pub const fn as_str(self) -> &'static str {
        match self {
            IndexKind::Bus => "bus",
            IndexKind::Class => "class",
            IndexKind::Path => "path",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secondary index value: the name of the device the key resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: IndexKind,
    pub device: BoundedStr,
}

impl IndexEntry {
    pub fn new(kind: IndexKind, device: BoundedStr) -> Self {
        Self { kind, device }
    }

    /// Build an entry from a raw device name, validating its bound.
    pub fn for_name(kind: IndexKind, device: &str) -> Result<Self> {
        Ok(Self::new(kind, BoundedStr::new(Field::Name, device)?))
    }

    pub fn references(&self, name: &BoundedStr) -> bool {
        &self.device == name
    }
}
