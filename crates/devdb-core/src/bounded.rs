//! Bounded string fields.
//!
//! Every stored string has a fixed capacity in the record layout. A
//! [`BoundedStr`] can only be built through a validating constructor, so a
//! value that would overflow its slot is rejected instead of truncated.

use crate::config::FieldLimits;
use crate::error::{DevDbError, Result};
use serde::Serialize;
use std::fmt;

/// Marker stored for descriptor fields the enumerator could not supply.
pub const UNKNOWN: &str = "unknown";

/// The string fields of a device record, each with its own ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    DevPath,
    ClassDevName,
    ClassName,
    BusName,
    BusId,
    Driver,
}

impl Field {
    /// Slot size in the fixed-width layout, terminator included.
    pub const fn capacity(self) -> usize {
        match self {
            Field::Name | Field::ClassDevName | Field::ClassName | Field::Driver => {
                FieldLimits::NAME_SIZE
            }
            Field::DevPath => FieldLimits::PATH_SIZE,
            Field::BusName => FieldLimits::BUS_SIZE,
            Field::BusId => FieldLimits::ID_SIZE,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::DevPath => "devpath",
            Field::ClassDevName => "class_dev",
            Field::ClassName => "class",
            Field::BusName => "bus",
            Field::BusId => "bus_id",
            Field::Driver => "driver",
        }
    }

    fn reject(self, message: impl Into<String>) -> DevDbError {
        DevDbError::Validation {
            field: self.as_str().to_string(),
            max: self.capacity(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-empty string strictly shorter than its field's capacity, free of
/// NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BoundedStr(String);

impl BoundedStr {
    pub fn new(field: Field, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        Self::check(field, &value)?;
        Ok(Self(value))
    }

    /// Validate without allocating.
    pub fn check(field: Field, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(field.reject("must not be empty"));
        }
        if value.len() >= field.capacity() {
            return Err(field.reject(format!(
                "length {} reaches capacity {}",
                value.len(),
                field.capacity()
            )));
        }
        if value.as_bytes().contains(&0) {
            return Err(field.reject("must not contain NUL bytes"));
        }
        Ok(())
    }

    /// Build from an optional descriptor value, substituting [`UNKNOWN`]
    /// when absent.
    pub fn or_unknown(field: Field, value: Option<&str>) -> Result<Self> {
        match value {
            Some(value) => Self::new(field, value),
            None => Ok(Self::unknown()),
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for BoundedStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for BoundedStr {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BoundedStr {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for BoundedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
