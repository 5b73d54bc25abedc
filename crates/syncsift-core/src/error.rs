//! Error types shared across the analysis pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the inventory, analysis and execution stages.
///
/// Only [`SiftError::Configuration`] is fatal for a run. Every other variant
/// is recovered where it happens and folded into a warning or an action
/// outcome.
#[derive(Debug, Error)]
pub enum SiftError {
    /// Invalid thresholds, limits or root descriptors.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// File could not be read while fingerprinting.
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory could not be listed.
    #[error("Cannot traverse {path}: {message}")]
    Traversal { path: PathBuf, message: String },

    /// A filesystem mutation failed while applying an action.
    #[error("Action failed on {path}: {message}")]
    ActionExecution { path: PathBuf, message: String },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The run was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SiftError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Read { path, source },
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Kind of non-fatal problem recorded during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// A directory could not be listed; its subtree was skipped.
    TraversalError,
    /// A file could not be read for fingerprinting.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// A scan limit (depth, per-level count, total bytes) truncated the walk.
    LimitReached,
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a permission denied warning.
    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Permission denied: {}", path.display()),
            path,
            kind: WarningKind::PermissionDenied,
        }
    }

    /// Create a skipped-subtree warning.
    pub fn traversal(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(path, message, WarningKind::TraversalError)
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let err = SiftError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SiftError::PermissionDenied { .. }));

        let err = SiftError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short"),
        );
        assert!(matches!(err, SiftError::Read { .. }));
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(SiftError::config("bad threshold").is_fatal());
        assert!(!SiftError::Cancelled.is_fatal());
        assert!(
            !SiftError::Traversal {
                path: "/x".into(),
                message: "denied".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_warning_creation() {
        let warning = ScanWarning::permission_denied("/test/path");
        assert_eq!(warning.kind, WarningKind::PermissionDenied);
        assert!(warning.message.contains("Permission denied"));
    }
}
