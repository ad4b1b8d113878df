//! Core types and traits for camscan.
//!
//! This crate provides the data model shared by the camscan crates: the
//! [`Camera`] trait the scanner consumes, filesystem items, scan
//! configuration, errors and reports.

mod camera;
mod config;
mod error;
mod item;
#[cfg(feature = "mock")]
mod mock;
mod report;

pub use camera::{Camera, StorageDevice};
pub use config::{DEFAULT_MAX_CONCURRENT_LISTINGS, ErrorPolicy, ScanConfig, ScanConfigBuilder};
pub use error::{CameraError, ScanError, ScanWarning, WarningKind};
pub use item::{FileSystemItem, ItemKind, ItemPath, StorageId};
#[cfg(feature = "mock")]
pub use mock::{MockCamera, MockError};
pub use report::{ScanReport, ScanStats};
