//! Camera filesystem scanning engine for camscan.
//!
//! This crate walks the folder hierarchy a connected camera exposes, filters
//! every discovered item through a caller-supplied predicate, and delivers the
//! matches through a single completion callback.
//!
//! # Overview
//!
//! `camscan-scan` is built on the [`Camera`] trait from `camscan-core`.
//! Key features:
//!
//! - **Concurrent listings** as tokio tasks, capped per camera
//! - **Exactly-once completion** across success, failure and cancellation
//! - **Tolerant or fail-fast** handling of unreadable folders
//! - **Progress updates** via broadcast channels
//! - **Short-circuiting** on a result limit, plus depth limits
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use camscan_core::Camera;
//! use camscan_scan::{FileScanner, predicate};
//!
//! async fn jpegs(camera: Arc<dyn Camera>) {
//!     let scanner = FileScanner::new();
//!     let handle = scanner.scan(camera, Some(predicate::extension(["JPG"])), |result| {
//!         match result {
//!             Ok(report) => println!("Found {} images", report.len()),
//!             Err(e) => eprintln!("Scan failed: {e}"),
//!         }
//!     });
//!
//!     // Watch progress until the scan finishes
//!     let mut progress_rx = handle.subscribe();
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Listed {} folders", progress.folders_listed);
//!         if progress.is_finished() {
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod predicate;
mod progress;
mod request;
mod scanner;

pub use predicate::Predicate;
pub use progress::{ScanPhase, ScanProgress};
pub use scanner::{FileScanner, ScanHandle};

// Re-export core types for convenience
pub use camscan_core::{
    Camera, CameraError, ErrorPolicy, FileSystemItem, ItemKind, ItemPath, ScanConfig,
    ScanConfigBuilder, ScanError, ScanReport, ScanStats, ScanWarning, StorageDevice, StorageId,
    WarningKind,
};

/// Channel buffer size for progress snapshots.
pub const PROGRESS_CHANNEL_SIZE: usize = 100;
