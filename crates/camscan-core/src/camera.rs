//! The camera surface the scanner is built on.

use async_trait::async_trait;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::CameraError;
use crate::item::{FileSystemItem, ItemPath, StorageId};

/// A root-level container on a camera, such as a memory card slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDevice {
    /// Identifier used in the paths of every item on this device.
    pub id: StorageId,
    /// Human-readable label ("SD1", "Internal").
    pub label: CompactString,
    /// Root folder, if the device exposes one.
    pub root: Option<FileSystemItem>,
}

impl StorageDevice {
    /// Create a storage device with a listable root folder.
    pub fn new(id: StorageId, label: impl Into<CompactString>) -> Self {
        Self {
            id,
            label: label.into(),
            root: Some(FileSystemItem::new_folder(ItemPath::root(id))),
        }
    }

    /// Create a storage device whose root folder is `root`.
    ///
    /// Cameras that address storage by handle often expose the root at a
    /// path other than `/`.
    pub fn with_root(id: StorageId, label: impl Into<CompactString>, root: FileSystemItem) -> Self {
        Self {
            id,
            label: label.into(),
            root: Some(root),
        }
    }

    /// Create a storage device that exposes no root folder (for example an
    /// empty or unformatted slot).
    pub fn without_root(id: StorageId, label: impl Into<CompactString>) -> Self {
        Self {
            id,
            label: label.into(),
            root: None,
        }
    }
}

/// A connected camera whose filesystem can be enumerated.
///
/// Every method may be slow; implementations typically perform a round trip
/// to the device. Errors are passed through to the scanner unchanged.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Whether the camera currently allows filesystem access.
    ///
    /// Many cameras only expose their storage in a dedicated transfer mode.
    fn supports_filesystem_access(&self) -> bool {
        true
    }

    /// List the camera's root storage devices.
    async fn storage_devices(&self) -> Result<Vec<StorageDevice>, CameraError>;

    /// List the immediate children of `folder`.
    async fn list_children(
        &self,
        folder: &FileSystemItem,
    ) -> Result<Vec<FileSystemItem>, CameraError>;
}

