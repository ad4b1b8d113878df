//! Camera filesystem item types.

use std::fmt;

use chrono::{DateTime, Utc};
use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};

/// Extensions (upper-case) of the image formats cameras commonly write.
const KNOWN_IMAGE_EXTENSIONS: &[&str] = &[
    "JPG", "JPEG", "HEIF", "HEIC", "HIF", "TIF", "TIFF", "PNG", "CR2", "CR3", "CRW", "NEF",
    "NRW", "ARW", "SRF", "SR2", "RAF", "ORF", "RW2", "DNG", "PEF", "SRW", "X3F",
];

/// Identifier of a storage device (card slot, internal memory) on a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageId(pub u32);

impl StorageId {
    /// Create a new StorageId.
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage{}", self.0)
    }
}

/// Unique location of an item within a camera's storage hierarchy.
///
/// Paths are slash-separated and absolute within their storage device; the
/// storage root is `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemPath {
    /// Storage device the item lives on.
    pub storage: StorageId,
    /// Path within the storage device.
    pub path: CompactString,
}

impl ItemPath {
    /// Create a path on the given storage device.
    pub fn new(storage: StorageId, path: impl Into<CompactString>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }

    /// The root of a storage device.
    pub fn root(storage: StorageId) -> Self {
        Self::new(storage, "/")
    }

    /// Check if this is a storage root.
    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Path of a child named `name` below this one.
    pub fn join(&self, name: &str) -> Self {
        let path = if self.is_root() {
            format_compact!("/{name}")
        } else {
            format_compact!("{}/{name}", self.path)
        };
        Self::new(self.storage, path)
    }

    /// Last path component, or `/` for a storage root.
    pub fn file_name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }

    /// Number of components below the storage root.
    pub fn depth(&self) -> u32 {
        self.path.split('/').filter(|c| !c.is_empty()).count() as u32
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage, self.path)
    }
}

/// Type of filesystem item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Container whose children are discovered by listing it.
    Folder,
    /// Terminal item.
    File,
}

/// A folder or file on a camera's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemItem {
    /// Unique location of this item.
    pub path: ItemPath,

    /// Display name (last path component).
    pub name: CompactString,

    /// Folder or file.
    pub kind: ItemKind,

    /// Size in bytes, when known. Always `None` for folders.
    pub size: Option<u64>,

    /// Creation date reported by the camera.
    pub date_created: Option<DateTime<Utc>>,

    /// Whether the camera has delivered metadata (name, size, dates) yet.
    pub metadata_loaded: bool,
}

impl FileSystemItem {
    /// Create a file item with loaded metadata.
    pub fn new_file(path: ItemPath, size: u64) -> Self {
        Self {
            name: path.file_name().into(),
            path,
            kind: ItemKind::File,
            size: Some(size),
            date_created: None,
            metadata_loaded: true,
        }
    }

    /// Create a folder item.
    pub fn new_folder(path: ItemPath) -> Self {
        Self {
            name: path.file_name().into(),
            path,
            kind: ItemKind::Folder,
            size: None,
            date_created: None,
            metadata_loaded: true,
        }
    }

    /// Set the creation date.
    pub fn with_date_created(mut self, date: DateTime<Utc>) -> Self {
        self.date_created = Some(date);
        self
    }

    /// Mark the item's metadata as not yet loaded by the camera.
    pub fn without_metadata(mut self) -> Self {
        self.metadata_loaded = false;
        self.size = None;
        self.date_created = None;
        self
    }

    /// Check if this item is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    /// Check if this item is a file.
    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }

    /// File extension without the leading dot, as stored on the camera.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }

    /// Check if the extension belongs to a still image format cameras write.
    pub fn is_known_image_type(&self) -> bool {
        self.is_file()
            && self.extension().is_some_and(|ext| {
                KNOWN_IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> ItemPath {
        ItemPath::new(StorageId::new(1), p)
    }

    #[test]
    fn test_item_path_join() {
        let root = ItemPath::root(StorageId::new(1));
        let dcim = root.join("DCIM");
        assert_eq!(dcim.path, "/DCIM");
        assert_eq!(dcim.join("100CANON").path, "/DCIM/100CANON");
        assert_eq!(dcim.join("100CANON").depth(), 2);
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn test_item_path_display() {
        assert_eq!(path("/DCIM").to_string(), "storage1:/DCIM");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(path("/DCIM/IMG_0001.JPG").file_name(), "IMG_0001.JPG");
        assert_eq!(ItemPath::root(StorageId::new(2)).file_name(), "/");
    }

    #[test]
    fn test_extension() {
        let item = FileSystemItem::new_file(path("/DCIM/IMG_0001.JPG"), 10);
        assert_eq!(item.extension(), Some("JPG"));

        let hidden = FileSystemItem::new_file(path("/.hidden"), 1);
        assert_eq!(hidden.extension(), None);

        let bare = FileSystemItem::new_file(path("/README"), 1);
        assert_eq!(bare.extension(), None);
    }

    #[test]
    fn test_known_image_type() {
        assert!(FileSystemItem::new_file(path("/a.jpg"), 1).is_known_image_type());
        assert!(FileSystemItem::new_file(path("/a.CR3"), 1).is_known_image_type());
        assert!(!FileSystemItem::new_file(path("/a.MOV"), 1).is_known_image_type());
        assert!(!FileSystemItem::new_folder(path("/a.jpg")).is_known_image_type());
    }

    #[test]
    fn test_without_metadata() {
        let item = FileSystemItem::new_file(path("/a.jpg"), 100).without_metadata();
        assert!(!item.metadata_loaded);
        assert_eq!(item.size, None);
    }
}
