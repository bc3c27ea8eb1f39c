//! Store key construction.
//!
//! All four key spaces share one flat engine namespace, so every key is
//! framed as:
//!
//! ```text
//! [kind tag: u8] ([segment len: u16 BE] [segment bytes])+
//! ```
//!
//! The tag keeps the spaces apart and the length prefixes make composite
//! keys injective: no two distinct part tuples encode to the same bytes,
//! whatever characters the parts contain.

use crate::bounded::{BoundedStr, Field};
use crate::error::{DevDbError, Result};
use crate::models::{DeviceRecord, IndexKind};
use std::fmt;

const SEGMENT_LEN_SIZE: usize = 2;

/// The logical key spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Name,
    Bus,
    Class,
    Path,
}

impl KeyKind {
    pub const fn tag(self) -> u8 {
        match self {
            KeyKind::Name => b'N',
            KeyKind::Bus => b'B',
            KeyKind::Class => b'C',
            KeyKind::Path => b'P',
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'N' => Some(KeyKind::Name),
            b'B' => Some(KeyKind::Bus),
            b'C' => Some(KeyKind::Class),
            b'P' => Some(KeyKind::Path),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyKind::Name => "name",
            KeyKind::Bus => "bus",
            KeyKind::Class => "class",
            KeyKind::Path => "path",
        }
    }

    /// Fields of the parts, in key order.
    pub const fn fields(self) -> &'static [Field] {
        match self {
            KeyKind::Name => &[Field::Name],
            KeyKind::Bus => &[Field::BusName, Field::BusId],
            KeyKind::Class => &[Field::ClassName, Field::ClassDevName],
            KeyKind::Path => &[Field::DevPath],
        }
    }

    pub const fn index_kind(self) -> Option<IndexKind> {
        match self {
            KeyKind::Name => None,
            KeyKind::Bus => Some(IndexKind::Bus),
            KeyKind::Class => Some(IndexKind::Class),
            KeyKind::Path => Some(IndexKind::Path),
        }
    }
}

impl From<IndexKind> for KeyKind {
    fn from(kind: IndexKind) -> Self {
        match kind {
            IndexKind::Bus => KeyKind::Bus,
            IndexKind::Class => KeyKind::Class,
            IndexKind::Path => KeyKind::Path,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded engine key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(Vec<u8>);

/// Validating key constructor.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Build a key of `kind` from its parts.
    ///
    /// `Bus` takes (bus, id), `Class` takes (class, class-dev), `Name` and
    /// `Path` take one part. Each part must be non-empty and strictly
    /// shorter than its field capacity.
    pub fn build(kind: KeyKind, parts: &[&str]) -> Result<StoreKey> {
        let fields = kind.fields();
        if parts.len() != fields.len() {
            return Err(DevDbError::Validation {
                field: kind.as_str().to_string(),
                max: fields.len(),
                message: format!(
                    "{} key takes {} part(s), got {}",
                    kind,
                    fields.len(),
                    parts.len()
                ),
            });
        }

        for (field, part) in fields.iter().zip(parts) {
            BoundedStr::check(*field, part)?;
        }

        Ok(StoreKey::encode(kind, parts))
    }
}

impl StoreKey {
    // Parts must already satisfy their field bounds.
    fn encode(kind: KeyKind, parts: &[&str]) -> Self {
        let capacity = 1 + parts
            .iter()
            .map(|part| SEGMENT_LEN_SIZE + part.len())
            .sum::<usize>();
        let mut bytes = Vec::with_capacity(capacity);
        bytes.push(kind.tag());
        for part in parts {
            debug_assert!(part.len() <= u16::MAX as usize);
            bytes.extend_from_slice(&(part.len() as u16).to_be_bytes());
            bytes.extend_from_slice(part.as_bytes());
        }
        Self(bytes)
    }

    pub fn name(name: &BoundedStr) -> Self {
        Self::encode(KeyKind::Name, &[name.as_str()])
    }

    /// Key of one secondary index of a record.
    pub fn index(record: &DeviceRecord, kind: IndexKind) -> Self {
        match kind {
            IndexKind::Bus => Self::encode(
                KeyKind::Bus,
                &[record.bus_name.as_str(), record.bus_id.as_str()],
            ),
            IndexKind::Class => Self::encode(
                KeyKind::Class,
                &[record.class_name.as_str(), record.class_dev_name.as_str()],
            ),
            IndexKind::Path => Self::encode(KeyKind::Path, &[record.devpath.as_str()]),
        }
    }

    /// The one-byte prefix shared by every key of `kind`.
    pub fn kind_prefix(kind: KeyKind) -> [u8; 1] {
        [kind.tag()]
    }

    /// Wrap raw bytes read back from the engine.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn kind(&self) -> Option<KeyKind> {
        self.0.first().copied().and_then(KeyKind::from_tag)
    }

    /// Parse the key back into its kind and parts.
    pub fn decode_parts(&self) -> Result<(KeyKind, Vec<String>)> {
        let kind = self
            .kind()
            .ok_or_else(|| DevDbError::decode("key", "unknown key kind tag"))?;

        let mut parts = Vec::with_capacity(kind.fields().len());
        let mut rest = &self.0[1..];
        while !rest.is_empty() {
            if rest.len() < SEGMENT_LEN_SIZE {
                return Err(DevDbError::decode("key", "truncated segment length"));
            }
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            rest = &rest[SEGMENT_LEN_SIZE..];
            if rest.len() < len {
                return Err(DevDbError::decode("key", "truncated segment"));
            }
            let part = std::str::from_utf8(&rest[..len])
                .map_err(|e| DevDbError::decode("key", format!("segment is not UTF-8: {}", e)))?;
            parts.push(part.to_string());
            rest = &rest[len..];
        }

        if parts.len() != kind.fields().len() {
            return Err(DevDbError::decode(
                "key",
                format!("{} key has {} segment(s)", kind, parts.len()),
            ));
        }

        Ok((kind, parts))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode_parts() {
            Ok((kind, parts)) => write!(f, "{}{:?}", kind, parts),
            Err(_) => {
                f.write_str("raw:")?;
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self)
    }
}
