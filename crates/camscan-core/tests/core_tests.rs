use camscan_core::{
    ErrorPolicy, FileSystemItem, ItemKind, ItemPath, ScanConfig, ScanError, ScanReport, ScanStats,
    ScanWarning, StorageDevice, StorageId, WarningKind,
};
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn on_card(path: &str) -> ItemPath {
    ItemPath::new(StorageId::new(1), path)
}

#[test]
fn test_storage_id_operations() {
    let id1 = StorageId::new(42);
    let id2 = StorageId::new(42);

    assert_eq!(id1, id2);
    assert_eq!(id1.0, 42);
    assert_eq!(id1.to_string(), "storage42");
}

#[test]
fn test_item_paths_are_storage_scoped() {
    let a = ItemPath::new(StorageId::new(1), "/DCIM/IMG_0001.JPG");
    let b = ItemPath::new(StorageId::new(2), "/DCIM/IMG_0001.JPG");

    assert_ne!(a, b);
    assert_eq!(a.file_name(), b.file_name());
}

#[test]
fn test_storage_device_roots() {
    let device = StorageDevice::new(StorageId::new(1), "SD1");
    let root = device.root.expect("device should expose a root");
    assert!(root.is_folder());
    assert!(root.path.is_root());
    assert_eq!(root.path.storage, StorageId::new(1));

    let empty_slot = StorageDevice::without_root(StorageId::new(2), "SD2");
    assert!(empty_slot.root.is_none());

    let handle_root = FileSystemItem::new_folder(ItemPath::new(StorageId::new(3), "/store_0003"));
    let by_handle = StorageDevice::with_root(StorageId::new(3), "Internal", handle_root.clone());
    assert_eq!(by_handle.root, Some(handle_root));
}

#[test]
fn test_file_item_creation_and_properties() {
    let created = Utc.with_ymd_and_hms(2023, 7, 14, 9, 30, 0).unwrap();
    let item = FileSystemItem::new_file(on_card("/DCIM/100CANON/IMG_0001.CR3"), 24_000_000)
        .with_date_created(created);

    assert!(item.is_file());
    assert!(!item.is_folder());
    assert_eq!(item.kind, ItemKind::File);
    assert_eq!(item.name.as_str(), "IMG_0001.CR3");
    assert_eq!(item.size, Some(24_000_000));
    assert_eq!(item.date_created, Some(created));
    assert!(item.metadata_loaded);
    assert!(item.is_known_image_type());
}

#[test]
fn test_folder_item_creation_and_properties() {
    let item = FileSystemItem::new_folder(on_card("/DCIM"));

    assert!(item.is_folder());
    assert_eq!(item.name.as_str(), "DCIM");
    assert_eq!(item.size, None);
    assert_eq!(item.extension(), None);
    assert!(!item.is_known_image_type());
}

#[test]
fn test_item_serialization() {
    let item = FileSystemItem::new_file(on_card("/DCIM/IMG_0001.JPG"), 512);
    let json = serde_json::to_string(&item).unwrap();
    let back: FileSystemItem = serde_json::from_str(&json).unwrap();
    assert_eq!(item, back);
}

#[test]
fn test_scan_config_builder() {
    let config = ScanConfig::builder()
        .error_policy(ErrorPolicy::FailFast)
        .max_depth(Some(5u32))
        .max_results(Some(100usize))
        .max_concurrent_listings(2usize)
        .build()
        .unwrap();

    assert_eq!(config.error_policy, ErrorPolicy::FailFast);
    assert_eq!(config.max_depth, Some(5));
    assert_eq!(config.max_results, Some(100));
    assert_eq!(config.max_concurrent_listings, 2);
    assert!(!config.include_matching_folders);

    // Depth limit: a folder at depth 4 is listed, depth 5 is not
    assert!(config.should_descend(4));
    assert!(!config.should_descend(5));

    // Test default config
    let default_config = ScanConfig::default();
    assert_eq!(default_config.error_policy, ErrorPolicy::Tolerant);
    assert_eq!(default_config.max_depth, None);
    assert_eq!(default_config.max_results, None);
}

#[test]
fn test_scan_error_messages() {
    assert_eq!(
        ScanError::NoStorageDevices.to_string(),
        "Camera has no storage devices"
    );
    assert_eq!(
        ScanError::NoRootFolders.to_string(),
        "No storage device exposes a listable root folder"
    );

    let err = ScanError::listing(on_card("/DCIM"), "timed out");
    assert!(err.to_string().contains("storage1:/DCIM"));
    assert!(err.to_string().contains("timed out"));
    assert!(!err.is_structural());
}

#[test]
fn test_scan_report_accessors() {
    let items = vec![
        FileSystemItem::new_file(on_card("/DCIM/a.JPG"), 1),
        FileSystemItem::new_file(on_card("/DCIM/b.JPG"), 2),
    ];
    let mut stats = ScanStats::new();
    for item in &items {
        stats.record_match(item);
    }
    let warnings = vec![ScanWarning::new(
        on_card("/MISC"),
        "Listing failed: busy",
        WarningKind::ListingFailed,
    )];

    let report = ScanReport::new(
        items,
        ScanConfig::new(),
        stats,
        Duration::from_millis(20),
        warnings,
        false,
    );

    assert_eq!(report.len(), 2);
    assert!(!report.is_empty());
    assert!(report.has_warnings());
    assert!(!report.truncated);
    assert_eq!(report.stats.matched_size, 3);
    assert_eq!(report.into_items().len(), 2);
}
