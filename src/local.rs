//! Local directories exposed as camera storage devices.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use tracing::debug;

use camscan_core::{Camera, CameraError, FileSystemItem, ItemPath, StorageDevice, StorageId};

/// One directory standing in for a memory card.
#[derive(Debug, Clone)]
struct LocalStorage {
    id: StorageId,
    label: CompactString,
    dir: PathBuf,
}

/// A camera whose storage devices are local directories.
///
/// Useful for scanning a mounted card or a copied `DCIM` tree with the same
/// engine that drives a tethered camera. Storage ids are assigned from 1 in
/// the order the directories were given.
#[derive(Debug, Clone, Default)]
pub struct LocalCamera {
    storages: Vec<LocalStorage>,
}

impl LocalCamera {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let storages = dirs
            .into_iter()
            .zip(1u32..)
            .map(|(dir, id)| {
                let dir = dir.into();
                let label = dir
                    .file_name()
                    .map(|name| CompactString::from(name.to_string_lossy()))
                    .unwrap_or_else(|| CompactString::from(dir.to_string_lossy()));
                LocalStorage {
                    id: StorageId::new(id),
                    label,
                    dir,
                }
            })
            .collect();

        Self { storages }
    }

    /// Label of the storage device with `id`.
    pub fn label(&self, id: StorageId) -> Option<&str> {
        self.storage(id).map(|s| s.label.as_str())
    }

    fn storage(&self, id: StorageId) -> Option<&LocalStorage> {
        self.storages.iter().find(|s| s.id == id)
    }

    /// Map an item path onto the local filesystem.
    fn resolve(&self, path: &ItemPath) -> io::Result<PathBuf> {
        let storage = self.storage(path.storage).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("unknown storage device {}", path.storage),
            )
        })?;
        let relative = path.path.trim_start_matches('/');
        if relative.split('/').any(|c| c == "..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes storage root: {path}"),
            ));
        }
        Ok(storage.dir.join(relative))
    }
}

#[async_trait]
impl Camera for LocalCamera {
    async fn storage_devices(&self) -> Result<Vec<StorageDevice>, CameraError> {
        let mut devices = Vec::with_capacity(self.storages.len());
        for storage in &self.storages {
            let device = if is_dir(&storage.dir).await {
                StorageDevice::new(storage.id, storage.label.clone())
            } else {
                debug!(dir = %storage.dir.display(), "Storage directory is not readable");
                StorageDevice::without_root(storage.id, storage.label.clone())
            };
            devices.push(device);
        }
        Ok(devices)
    }

    async fn list_children(
        &self,
        folder: &FileSystemItem,
    ) -> Result<Vec<FileSystemItem>, CameraError> {
        let dir = self.resolve(&folder.path)?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut children = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let name = entry.file_name();
            let path = folder.path.join(&name.to_string_lossy());

            let item = if metadata.is_dir() {
                FileSystemItem::new_folder(path)
            } else if metadata.is_file() {
                FileSystemItem::new_file(path, metadata.len())
            } else {
                // Symlinks and special files
                continue;
            };

            let created = metadata.created().or_else(|_| metadata.modified());
            children.push(match created {
                Ok(time) => item.with_date_created(DateTime::<Utc>::from(time)),
                Err(_) => item,
            });
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}
