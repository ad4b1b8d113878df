//! Scan progress reporting.

use std::time::{Duration, Instant};

use camscan_core::ItemPath;

/// Lifecycle of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    /// Created, not started.
    Idle,
    /// Asking the camera for its storage devices.
    Enumerating,
    /// Listing folders.
    Traversing,
    /// Building the result.
    Finalizing,
    /// The completion has been delivered. Terminal.
    Completed,
}

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Current phase.
    pub phase: ScanPhase,
    /// Number of folder listings completed (successfully or not).
    pub folders_listed: u64,
    /// Number of folder listings issued but not yet completed.
    pub folders_pending: u64,
    /// Number of items returned by listings so far.
    pub items_seen: u64,
    /// Number of items matched so far.
    pub items_matched: u64,
    /// Number of failed listings.
    pub errors_count: u64,
    /// Folder whose listing completed most recently.
    pub current_path: Option<ItemPath>,
    /// Time elapsed since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Idle,
            folders_listed: 0,
            folders_pending: 0,
            items_seen: 0,
            items_matched: 0,
            errors_count: 0,
            current_path: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in items per second.
    pub fn items_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.items_seen as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fraction of known folders already listed, from 0.0 to 1.0.
    ///
    /// The tree is discovered while it is walked, so this can move
    /// backwards when a listing turns up many new folders.
    pub fn fraction_listed(&self) -> f64 {
        let known = self.folders_listed + self.folders_pending;
        if known > 0 {
            self.folders_listed as f64 / known as f64
        } else if self.phase == ScanPhase::Completed {
            1.0
        } else {
            0.0
        }
    }

    /// Check if the scan has delivered its result.
    pub fn is_finished(&self) -> bool {
        self.phase == ScanPhase::Completed
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    folders_listed: u64,
    items_seen: u64,
    items_matched: u64,
    errors_count: u64,
    current_path: Option<ItemPath>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            folders_listed: 0,
            items_seen: 0,
            items_matched: 0,
            errors_count: 0,
            current_path: None,
        }
    }

    pub fn record_listing(&mut self, path: &ItemPath, items: usize) {
        self.folders_listed += 1;
        self.items_seen += items as u64;
        self.current_path = Some(path.clone());
    }

    pub fn record_match(&mut self) {
        self.items_matched += 1;
    }

    pub fn record_error(&mut self, path: &ItemPath) {
        self.folders_listed += 1;
        self.errors_count += 1;
        self.current_path = Some(path.clone());
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self, phase: ScanPhase, pending: usize) -> ScanProgress {
        ScanProgress {
            phase,
            folders_listed: self.folders_listed,
            folders_pending: pending as u64,
            items_seen: self.items_seen,
            items_matched: self.items_matched,
            errors_count: self.errors_count,
            current_path: self.current_path.clone(),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
