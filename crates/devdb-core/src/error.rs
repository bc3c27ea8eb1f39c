//! Error types for the device registry.
//!
//! Each variant corresponds to one failure class of the registry:
//! bad input, a missing device, engine failures, corrupt stored bytes,
//! and index/primary drift that could not be repaired automatically.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for devdb.
#[derive(Debug, Error)]
pub enum DevDbError {
    /// Input violates a bound or non-empty constraint. Raised before any
    /// store access.
    #[error("Validation error for {field} (max {max}): {message}")]
    Validation {
        field: String,
        max: usize,
        message: String,
    },

    /// A well-formed lookup found nothing. Only produced by APIs that
    /// require a device to exist; plain lookups return `Option`.
    #[error("Device not found by {kind}: {key}")]
    NotFound { kind: String, key: String },

    // Engine errors
    #[error("Engine error: {message}")]
    Engine {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Stored bytes do not match the expected record layout.
    #[error("Decode error in {kind}: {message}")]
    Decode { kind: String, message: String },

    /// Index and primary data have drifted apart, or a rollback could not
    /// restore every key it touched.
    #[error("Inconsistency during {operation} (keys: {}): {message}", .keys.join(", "))]
    Inconsistency {
        operation: String,
        keys: Vec<String>,
        message: String,
    },

    /// Handle lifecycle violation (not open, already open, poisoned lock).
    #[error("Invalid store state: {message}")]
    State { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for devdb operations.
pub type Result<T> = std::result::Result<T, DevDbError>;

impl From<std::io::Error> for DevDbError {
    fn from(err: std::io::Error) -> Self {
        DevDbError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for DevDbError {
    fn from(err: rusqlite::Error) -> Self {
        DevDbError::Engine {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl DevDbError {
    /// Create an engine error that has no underlying rusqlite cause.
    pub fn engine(message: impl Into<String>) -> Self {
        DevDbError::Engine {
            message: message.into(),
            source: None,
        }
    }

    pub fn decode(kind: impl Into<String>, message: impl Into<String>) -> Self {
        DevDbError::Decode {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        DevDbError::State {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DevDbError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DevDbError::Validation { .. })
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, DevDbError::Engine { .. })
    }

    pub fn is_inconsistency(&self) -> bool {
        matches!(self, DevDbError::Inconsistency { .. })
    }

    /// Map to a process exit code for command-line front ends.
    ///
    /// - 2: validation error (bad input)
    /// - 3: device not found
    /// - 4: engine or IO failure
    /// - 5: decode error (store corruption)
    /// - 6: inconsistency (operator intervention needed)
    /// - 1: everything else
    pub fn exit_code(&self) -> i32 {
        match self {
            DevDbError::Validation { .. } => 2,
            DevDbError::NotFound { .. } => 3,
            DevDbError::Engine { .. } | DevDbError::Io { .. } => 4,
            DevDbError::Decode { .. } => 5,
            DevDbError::Inconsistency { .. } => 6,
            DevDbError::State { .. } | DevDbError::Config { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DevDbError::NotFound {
            kind: "name".into(),
            key: "sda".into(),
        };
        assert_eq!(err.to_string(), "Device not found by name: sda");
    }

    #[test]
    fn test_inconsistency_display_lists_keys() {
        let err = DevDbError::Inconsistency {
            operation: "add_device".into(),
            keys: vec!["bus:scsi/0:0:0:0".into(), "name:sda".into()],
            message: "rollback failed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("add_device"));
        assert!(text.contains("bus:scsi/0:0:0:0, name:sda"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            DevDbError::Validation {
                field: "name".into(),
                max: 100,
                message: "empty".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(DevDbError::engine("disk full").exit_code(), 4);
        assert_eq!(DevDbError::decode("record", "short").exit_code(), 5);
        assert_eq!(DevDbError::state("closed").exit_code(), 1);
    }

    #[test]
    fn test_rusqlite_error_maps_to_engine() {
        let err: DevDbError = rusqlite::Error::InvalidQuery.into();
        assert!(err.is_engine());
    }
}
