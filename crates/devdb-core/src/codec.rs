//! Fixed-width record codec.
//!
//! Strings occupy their full field capacity, NUL-padded; integers are
//! big-endian. A stored value whose length differs from the layout size is
//! corrupt and is rejected rather than read partially.

use crate::bounded::{BoundedStr, Field};
use crate::config::FieldLimits;
use crate::error::{DevDbError, Result};
use crate::models::{DeviceRecord, DeviceType, IndexEntry, IndexKind};

const STRINGS_SIZE: usize = FieldLimits::NAME_SIZE
    + FieldLimits::PATH_SIZE
    + FieldLimits::NAME_SIZE
    + FieldLimits::NAME_SIZE
    + FieldLimits::BUS_SIZE
    + FieldLimits::ID_SIZE
    + FieldLimits::NAME_SIZE;

/// Encoded size of a `DeviceRecord`: strings, type byte, major, minor, mode.
pub const RECORD_SIZE: usize = STRINGS_SIZE + 1 + 4 + 4 + 4;

/// Encoded size of an `IndexEntry`: kind tag plus device name.
pub const ENTRY_SIZE: usize = 1 + FieldLimits::NAME_SIZE;

const RECORD_LABEL: &str = "device record";

fn entry_tag(kind: IndexKind) -> u8 {
    match kind {
        IndexKind::Bus => b'b',
        IndexKind::Class => b'c',
        IndexKind::Path => b'p',
    }
}

fn entry_label(kind: IndexKind) -> String {
    format!("{} index entry", kind)
}

fn put_str(buf: &mut Vec<u8>, value: &BoundedStr, field: Field) {
    let bytes = value.as_str().as_bytes();
    debug_assert!(bytes.len() < field.capacity());
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + field.capacity() - bytes.len(), 0);
}

fn read_str(slot: &[u8], field: Field, label: &str) -> Result<BoundedStr> {
    let end = slot.iter().position(|&b| b == 0).ok_or_else(|| {
        DevDbError::decode(label, format!("{} is not NUL-terminated", field))
    })?;
    if slot[end..].iter().any(|&b| b != 0) {
        return Err(DevDbError::decode(
            label,
            format!("{} has bytes after its terminator", field),
        ));
    }
    let value = std::str::from_utf8(&slot[..end])
        .map_err(|e| DevDbError::decode(label, format!("{} is not UTF-8: {}", field, e)))?;
    BoundedStr::new(field, value)
        .map_err(|e| DevDbError::decode(label, format!("{} is invalid: {}", field, e)))
}

/// A forward-only reader over a fixed-size buffer.
struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    // Callers check the total length up front, so slicing cannot overrun.
    fn take(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        slice
    }

    fn take_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N));
        out
    }
}

pub fn encode_record(record: &DeviceRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_SIZE);
    put_str(&mut buf, &record.name, Field::Name);
    put_str(&mut buf, &record.devpath, Field::DevPath);
    put_str(&mut buf, &record.class_dev_name, Field::ClassDevName);
    put_str(&mut buf, &record.class_name, Field::ClassName);
    put_str(&mut buf, &record.bus_name, Field::BusName);
    put_str(&mut buf, &record.bus_id, Field::BusId);
    put_str(&mut buf, &record.driver, Field::Driver);
    buf.push(record.dev_type.as_char() as u8);
    buf.extend_from_slice(&record.major.to_be_bytes());
    buf.extend_from_slice(&record.minor.to_be_bytes());
    buf.extend_from_slice(&record.mode.to_be_bytes());
    debug_assert_eq!(buf.len(), RECORD_SIZE);
    buf
}

pub fn decode_record(bytes: &[u8]) -> Result<DeviceRecord> {
    if bytes.len() != RECORD_SIZE {
        return Err(DevDbError::decode(
            RECORD_LABEL,
            format!("expected {} bytes, got {}", RECORD_SIZE, bytes.len()),
        ));
    }

    let mut cursor = Cursor::new(bytes);
    let mut read = |field: Field| read_str(cursor.take(field.capacity()), field, RECORD_LABEL);
    let name = read(Field::Name)?;
    let devpath = read(Field::DevPath)?;
    let class_dev_name = read(Field::ClassDevName)?;
    let class_name = read(Field::ClassName)?;
    let bus_name = read(Field::BusName)?;
    let bus_id = read(Field::BusId)?;
    let driver = read(Field::Driver)?;

    let [type_byte] = cursor.take_array::<1>();
    let dev_type = DeviceType::from_char(type_byte as char).ok_or_else(|| {
        DevDbError::decode(RECORD_LABEL, format!("unknown device type byte {:#04x}", type_byte))
    })?;
    let major = i32::from_be_bytes(cursor.take_array());
    let minor = i32::from_be_bytes(cursor.take_array());
    let mode = u32::from_be_bytes(cursor.take_array());

    Ok(DeviceRecord {
        name,
        devpath,
        class_dev_name,
        class_name,
        bus_name,
        bus_id,
        driver,
        dev_type,
        major,
        minor,
        mode,
    })
}

pub fn encode_entry(entry: &IndexEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ENTRY_SIZE);
    buf.push(entry_tag(entry.kind));
    put_str(&mut buf, &entry.device, Field::Name);
    buf
}

/// Decode an index entry read from a key of `kind`.
pub fn decode_entry(kind: IndexKind, bytes: &[u8]) -> Result<IndexEntry> {
    let label = entry_label(kind);
    if bytes.len() != ENTRY_SIZE {
        return Err(DevDbError::decode(
            &label,
            format!("expected {} bytes, got {}", ENTRY_SIZE, bytes.len()),
        ));
    }
    if bytes[0] != entry_tag(kind) {
        return Err(DevDbError::decode(
            &label,
            format!("entry tag {:#04x} does not match {} index", bytes[0], kind),
        ));
    }
    let device = read_str(&bytes[1..], Field::Name, &label)?;
    Ok(IndexEntry::new(kind, device))
}
