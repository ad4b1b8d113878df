//! In-memory camera for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use compact_str::CompactString;
use thiserror::Error;

use crate::camera::{Camera, StorageDevice};
use crate::error::CameraError;
use crate::item::{FileSystemItem, ItemPath, StorageId};

/// Error returned by [`MockCamera`] for requests configured to fail.
#[derive(Debug, Error)]
pub enum MockError {
    /// Listing a folder failed.
    #[error("mock listing failed for {path}")]
    Listing { path: ItemPath },
    /// Enumerating storage devices failed.
    #[error("mock storage enumeration failed")]
    Storage,
}

/// In-memory camera for testing.
///
/// The tree is described up front with the `with_*` methods; intermediate
/// folders are created on demand. Listings can be made to fail, stall
/// forever, or take a while, and the camera counts the requests it served so
/// tests can assert on traversal behaviour.
///
/// # Examples
///
/// ```
/// use camscan_core::{Camera, MockCamera};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let camera = MockCamera::new()
///     .with_storage(1, "SD1")
///     .with_file(1, "/DCIM/100CANON/IMG_0001.JPG", 1024);
///
/// let devices = camera.storage_devices().await?;
/// let root = devices[0].root.clone().unwrap();
/// let children = camera.list_children(&root).await?;
/// assert_eq!(children[0].name, "DCIM");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockCamera {
    storages: Vec<StorageDevice>,
    children: BTreeMap<ItemPath, Vec<FileSystemItem>>,
    failing: HashSet<ItemPath>,
    stalled: HashSet<ItemPath>,
    panicking: HashSet<ItemPath>,
    latency: HashMap<ItemPath, Duration>,
    default_latency: Option<Duration>,
    no_filesystem_access: bool,
    fail_storage_enumeration: bool,
    panic_storage_enumeration: bool,
    storage_calls: AtomicUsize,
    listing_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    listed: Mutex<Vec<ItemPath>>,
}

impl MockCamera {
    /// Create a camera with no storage devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a storage device with an empty root folder.
    pub fn with_storage(mut self, id: u32, label: impl Into<CompactString>) -> Self {
        let device = StorageDevice::new(StorageId::new(id), label);
        self.children.entry(ItemPath::root(device.id)).or_default();
        self.storages.push(device);
        self
    }

    /// Add a storage device whose root folder lives at `root`.
    ///
    /// Items under the root are added with their full path, for example
    /// `/store_0001/DCIM/IMG_0001.JPG`.
    pub fn with_storage_root(
        mut self,
        id: u32,
        label: impl Into<CompactString>,
        root: &str,
    ) -> Self {
        let id = StorageId::new(id);
        let root = FileSystemItem::new_folder(ItemPath::new(id, root));
        self.children.entry(root.path.clone()).or_default();
        self.storages
            .push(StorageDevice::with_root(id, label, root));
        self
    }

    /// Add a storage device that exposes no root folder.
    pub fn with_rootless_storage(mut self, id: u32, label: impl Into<CompactString>) -> Self {
        self.storages
            .push(StorageDevice::without_root(StorageId::new(id), label));
        self
    }

    /// Add a file, creating its parent folders.
    pub fn with_file(self, storage: u32, path: &str, size: u64) -> Self {
        let item = FileSystemItem::new_file(ItemPath::new(StorageId::new(storage), path), size);
        self.with_item(item)
    }

    /// Add an empty folder, creating its parent folders.
    pub fn with_folder(mut self, storage: u32, path: &str) -> Self {
        let path = ItemPath::new(StorageId::new(storage), path);
        self.children.entry(path.clone()).or_default();
        self.with_item(FileSystemItem::new_folder(path))
    }

    /// Add an arbitrary item, creating its parent folders.
    pub fn with_item(mut self, item: FileSystemItem) -> Self {
        self.insert(item);
        self
    }

    /// Make listing the folder at `path` fail.
    pub fn fail_listing(mut self, storage: u32, path: &str) -> Self {
        self.failing
            .insert(ItemPath::new(StorageId::new(storage), path));
        self
    }

    /// Make listing the folder at `path` never complete.
    pub fn stall_listing(mut self, storage: u32, path: &str) -> Self {
        self.stalled
            .insert(ItemPath::new(StorageId::new(storage), path));
        self
    }

    /// Make listing the folder at `path` panic.
    pub fn panic_listing(mut self, storage: u32, path: &str) -> Self {
        self.panicking
            .insert(ItemPath::new(StorageId::new(storage), path));
        self
    }

    /// Delay the listing of the folder at `path`.
    pub fn with_folder_latency(mut self, storage: u32, path: &str, delay: Duration) -> Self {
        self.latency
            .insert(ItemPath::new(StorageId::new(storage), path), delay);
        self
    }

    /// Delay every listing without a folder-specific latency.
    pub fn with_latency(mut self, delay: Duration) -> Self {
        self.default_latency = Some(delay);
        self
    }

    /// Report that filesystem access is unavailable.
    pub fn without_filesystem_access(mut self) -> Self {
        self.no_filesystem_access = true;
        self
    }

    /// Make storage device enumeration fail.
    pub fn fail_storage_enumeration(mut self) -> Self {
        self.fail_storage_enumeration = true;
        self
    }

    /// Make storage device enumeration panic.
    pub fn panic_storage_enumeration(mut self) -> Self {
        self.panic_storage_enumeration = true;
        self
    }

    /// Number of `storage_devices` calls served.
    pub fn storage_calls(&self) -> usize {
        self.storage_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_children` calls served.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Highest number of listings that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Folders listed so far, in request order.
    pub fn listed_paths(&self) -> Vec<ItemPath> {
        self.listed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn insert(&mut self, item: FileSystemItem) {
        let Some(parent) = parent_of(&item.path) else {
            return;
        };
        if !parent.is_root() {
            self.insert(FileSystemItem::new_folder(parent.clone()));
        }
        if item.is_folder() {
            self.children.entry(item.path.clone()).or_default();
        }

        let siblings = self.children.entry(parent).or_default();
        if !siblings.iter().any(|s| s.path == item.path) {
            siblings.push(item);
        }
    }
}

fn parent_of(path: &ItemPath) -> Option<ItemPath> {
    if path.is_root() {
        return None;
    }
    let (parent, _) = path.path.rsplit_once('/')?;
    let parent = if parent.is_empty() { "/" } else { parent };
    Some(ItemPath::new(path.storage, parent))
}

/// Decrements the in-flight counter when a listing finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Camera for MockCamera {
    fn supports_filesystem_access(&self) -> bool {
        !self.no_filesystem_access
    }

    async fn storage_devices(&self) -> Result<Vec<StorageDevice>, CameraError> {
        self.storage_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_storage_enumeration {
            panic!("mock storage enumeration panicked");
        }
        if self.fail_storage_enumeration {
            return Err(MockError::Storage.into());
        }
        Ok(self.storages.clone())
    }

    async fn list_children(
        &self,
        folder: &FileSystemItem,
    ) -> Result<Vec<FileSystemItem>, CameraError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.listed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(folder.path.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self
            .latency
            .get(&folder.path)
            .copied()
            .or(self.default_latency)
        {
            tokio::time::sleep(delay).await;
        }

        if self.stalled.contains(&folder.path) {
            std::future::pending::<()>().await;
        }

        if self.panicking.contains(&folder.path) {
            panic!("mock listing panicked for {}", folder.path);
        }

        if self.failing.contains(&folder.path) {
            return Err(MockError::Listing {
                path: folder.path.clone(),
            }
            .into());
        }

        Ok(self.children.get(&folder.path).cloned().unwrap_or_default())
    }
}
