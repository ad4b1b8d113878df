//! Concurrent camera filesystem scanner.

use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

use camscan_core::{Camera, ScanConfig, ScanError, ScanReport};

use crate::predicate::Predicate;
use crate::progress::{ScanPhase, ScanProgress};
use crate::request::ScanRequest;

/// Walks a camera's storage devices and collects the items a predicate
/// accepts.
///
/// The scanner holds nothing but its configuration; every call to
/// [`scan`](Self::scan) gets its own isolated state, so one scanner can run
/// any number of scans at once.
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    /// Create a scanner with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scanner with a custom configuration.
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// The configuration every scan starts from.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start scanning `camera` in the background.
    ///
    /// Returns immediately. `completion` is invoked exactly once: with the
    /// deduplicated matches, or with the error that ended the scan. Without a
    /// `predicate` every file matches and no folder does.
    ///
    /// The completion runs on a runtime worker thread, or on the thread that
    /// calls [`ScanHandle::cancel`] if the scan is cancelled.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn scan<C, F>(&self, camera: Arc<C>, predicate: Option<Predicate>, completion: F) -> ScanHandle
    where
        C: Camera + ?Sized + 'static,
        F: FnOnce(Result<ScanReport, ScanError>) + Send + 'static,
    {
        let request = Arc::new(ScanRequest::new(
            camera,
            predicate,
            self.config.clone(),
            Box::new(completion),
        ));

        tokio::spawn(Arc::clone(&request).run());

        ScanHandle {
            control: request,
        }
    }

    /// Scan `camera` and wait for the result.
    ///
    /// Dropping the returned future cancels the scan.
    pub async fn scan_for_files<C>(
        &self,
        camera: Arc<C>,
        predicate: Option<Predicate>,
    ) -> Result<ScanReport, ScanError>
    where
        C: Camera + ?Sized + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = self.scan(camera, predicate, move |outcome| {
            let _ = tx.send(outcome);
        });
        let _cancel_on_drop = CancelOnDrop(handle);

        rx.await.unwrap_or(Err(ScanError::Cancelled))
    }
}

/// Type-erased view of a running scan.
trait ScanControl: Send + Sync {
    fn cancel(&self);
    fn phase(&self) -> ScanPhase;
    fn is_finished(&self) -> bool;
    fn subscribe(&self) -> broadcast::Receiver<ScanProgress>;
}

impl<C: Camera + ?Sized + 'static> ScanControl for ScanRequest<C> {
    fn cancel(&self) {
        self.finish(Err(ScanError::Cancelled));
    }

    fn phase(&self) -> ScanPhase {
        ScanRequest::phase(self)
    }

    fn is_finished(&self) -> bool {
        self.is_completed()
    }

    fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        ScanRequest::subscribe(self)
    }
}

/// Handle to a scan started with [`FileScanner::scan`].
///
/// Dropping the handle does not stop the scan.
#[derive(Clone)]
pub struct ScanHandle {
    control: Arc<dyn ScanControl>,
}

impl ScanHandle {
    /// Cancel the scan.
    ///
    /// If the scan has not completed yet, its completion receives
    /// [`ScanError::Cancelled`] before this returns and every outstanding
    /// listing is abandoned. Does nothing after completion.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ScanPhase {
        self.control.phase()
    }

    /// Check if the completion has been delivered (or is being delivered).
    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    /// Subscribe to progress snapshots.
    ///
    /// Snapshots are sent after every listing. Slow receivers skip
    /// snapshots rather than slowing the scan down.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.control.subscribe()
    }
}

impl std::fmt::Debug for ScanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

struct CancelOnDrop(ScanHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
