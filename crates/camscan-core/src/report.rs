//! Scan results and statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::item::{FileSystemItem, ItemKind, ItemPath};

/// Summary statistics for a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Folders whose listing completed successfully.
    pub folders_listed: u64,
    /// Folders discovered (storage roots included).
    pub folders_seen: u64,
    /// Files discovered.
    pub files_seen: u64,
    /// Items that matched the predicate.
    pub items_matched: u64,
    /// Total size in bytes of matched files with known sizes.
    pub matched_size: u64,
    /// Deepest item seen.
    pub max_depth: u32,
    /// Largest matched file (path, size).
    pub largest_match: Option<(ItemPath, u64)>,
    /// Oldest matched item by creation date.
    pub oldest_match: Option<(ItemPath, DateTime<Utc>)>,
    /// Newest matched item by creation date.
    pub newest_match: Option<(ItemPath, DateTime<Utc>)>,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a discovered item `depth` levels below its
    /// storage root.
    pub fn record_seen(&mut self, item: &FileSystemItem, depth: u32) {
        match item.kind {
            ItemKind::Folder => self.folders_seen += 1,
            ItemKind::File => self.files_seen += 1,
        }
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a successful folder listing.
    pub fn record_listing(&mut self) {
        self.folders_listed += 1;
    }

    /// Update stats with a matched item.
    pub fn record_match(&mut self, item: &FileSystemItem) {
        self.items_matched += 1;

        if let Some(size) = item.size {
            self.matched_size += size;
            if self.largest_match.as_ref().is_none_or(|(_, s)| size > *s) {
                self.largest_match = Some((item.path.clone(), size));
            }
        }

        if let Some(created) = item.date_created {
            if self.oldest_match.as_ref().is_none_or(|(_, t)| created < *t) {
                self.oldest_match = Some((item.path.clone(), created));
            }
            if self.newest_match.as_ref().is_none_or(|(_, t)| created > *t) {
                self.newest_match = Some((item.path.clone(), created));
            }
        }
    }
}

/// Outcome of a successful scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Matched items, deduplicated, in discovery order.
    pub items: Vec<FileSystemItem>,

    /// When this scan finished.
    pub scanned_at: DateTime<Utc>,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Subtrees that could not be scanned.
    pub warnings: Vec<ScanWarning>,

    /// Whether the scan stopped early at `config.max_results`.
    pub truncated: bool,
}

impl ScanReport {
    /// Create a new scan report.
    pub fn new(
        items: Vec<FileSystemItem>,
        config: ScanConfig,
        stats: ScanStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
        truncated: bool,
    ) -> Self {
        Self {
            items,
            scanned_at: Utc::now(),
            scan_duration,
            config,
            stats,
            warnings,
            truncated,
        }
    }

    /// Number of matched items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if any subtree was skipped.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Consume the report, keeping only the matched items.
    pub fn into_items(self) -> Vec<FileSystemItem> {
        self.items
    }
}
