//! Error types for scanning operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{ItemPath, StorageId};

/// Error type returned by [`Camera`](crate::Camera) implementations.
pub type CameraError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that end a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The camera is not in a mode that allows filesystem access.
    #[error("Camera does not currently allow filesystem access")]
    FilesystemAccessUnavailable,

    /// The camera reports no storage devices.
    #[error("Camera has no storage devices")]
    NoStorageDevices,

    /// No storage device exposes a listable root folder.
    #[error("No storage device exposes a listable root folder")]
    NoRootFolders,

    /// Enumerating the camera's storage devices failed.
    #[error("Failed to enumerate storage devices: {source}")]
    StorageEnumeration {
        #[source]
        source: CameraError,
    },

    /// Listing a folder's children failed.
    #[error("Failed to list {path}: {source}")]
    Listing {
        path: ItemPath,
        #[source]
        source: CameraError,
    },

    /// The scan was cancelled by the caller.
    #[error("Scan cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Wrap a camera error raised while listing `path`.
    pub fn listing(path: ItemPath, source: impl Into<CameraError>) -> Self {
        Self::Listing {
            path,
            source: source.into(),
        }
    }

    /// Check if this error describes the camera's storage topology rather
    /// than a failed request.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::FilesystemAccessUnavailable | Self::NoStorageDevices | Self::NoRootFolders
        )
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A folder could not be listed; its subtree was skipped.
    ListingFailed,
    /// A storage device exposes no root folder.
    MissingRootFolder,
}

/// Non-fatal warning encountered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: ItemPath,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: ItemPath, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path,
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a folder listing that failed.
    pub fn listing_failed(path: ItemPath, error: &dyn std::error::Error) -> Self {
        Self {
            message: format!("Listing failed: {error}"),
            path,
            kind: WarningKind::ListingFailed,
        }
    }

    /// Create a warning for a storage device without a root folder.
    pub fn missing_root(storage: StorageId) -> Self {
        Self {
            message: format!("{storage} exposes no root folder"),
            path: ItemPath::root(storage),
            kind: WarningKind::MissingRootFolder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_error_keeps_source() {
        let path = ItemPath::new(StorageId::new(1), "/DCIM");
        let err = ScanError::listing(path, "device busy");
        assert!(matches!(err, ScanError::Listing { .. }));
        assert_eq!(err.to_string(), "Failed to list storage1:/DCIM: device busy");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_structural_errors() {
        assert!(ScanError::NoStorageDevices.is_structural());
        assert!(ScanError::NoRootFolders.is_structural());
        assert!(!ScanError::Cancelled.is_structural());
    }

    #[test]
    fn test_scan_warning_creation() {
        let warning = ScanWarning::missing_root(StorageId::new(3));
        assert_eq!(warning.kind, WarningKind::MissingRootFolder);
        assert!(warning.message.contains("storage3"));
        assert!(warning.path.is_root());
    }
}
