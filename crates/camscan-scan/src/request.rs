//! Per-call scan state.
//!
//! A [`ScanRequest`] owns everything one call to
//! [`FileScanner::scan`](crate::FileScanner::scan) mutates: the matched
//! items, the count of outstanding listings, the first error and the
//! completion callback. All of it sits behind a single mutex; listing tasks
//! record their results under the lock and act on the returned [`Step`]
//! after releasing it, so the completion never runs while the lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use camscan_core::{
    Camera, CameraError, ErrorPolicy, FileSystemItem, ItemPath, ScanConfig, ScanError,
    ScanReport, ScanStats, ScanWarning,
};

use crate::predicate::Predicate;
use crate::progress::{ProgressTracker, ScanPhase, ScanProgress};
use crate::PROGRESS_CHANNEL_SIZE;

/// Callback receiving the outcome of a scan.
pub(crate) type Completion = Box<dyn FnOnce(Result<ScanReport, ScanError>) + Send + 'static>;

/// Mutable state of one scan, guarded by [`ScanRequest::state`].
struct ScanState {
    phase: ScanPhase,
    matches: IndexMap<ItemPath, FileSystemItem>,
    /// Listings issued and not yet recorded.
    pending: usize,
    /// Set once every root listing has been issued.
    roots_done: bool,
    roots_issued: usize,
    /// Root listings not yet recorded.
    roots_pending: usize,
    roots_failed: usize,
    first_error: Option<ScanError>,
    warnings: Vec<ScanWarning>,
    stats: ScanStats,
    tracker: ProgressTracker,
    truncated: bool,
    completed: bool,
    completion: Option<Completion>,
}

/// Outcome ready to be handed to the completion callback.
pub(crate) struct Delivery {
    completion: Completion,
    outcome: Result<ScanReport, ScanError>,
}

/// What a listing task must do after its result was recorded.
#[derive(Default)]
pub(crate) struct Step {
    /// Folders to list next. Already counted as pending.
    pub descend: Vec<FileSystemItem>,
    /// Set when this listing finished the scan.
    pub delivery: Option<Delivery>,
    /// Progress snapshot to publish.
    pub progress: Option<ScanProgress>,
}

/// Isolated state for one in-flight traversal.
pub(crate) struct ScanRequest<C: Camera + ?Sized> {
    camera: Arc<C>,
    predicate: Option<Predicate>,
    config: ScanConfig,
    state: Mutex<ScanState>,
    cancel: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl<C: Camera + ?Sized + 'static> ScanRequest<C> {
    pub fn new(
        camera: Arc<C>,
        predicate: Option<Predicate>,
        config: ScanConfig,
        completion: Completion,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        let limiter = match config.max_concurrent_listings {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Self {
            camera,
            predicate,
            config,
            state: Mutex::new(ScanState {
                phase: ScanPhase::Idle,
                matches: IndexMap::new(),
                pending: 0,
                roots_done: false,
                roots_issued: 0,
                roots_pending: 0,
                roots_failed: 0,
                first_error: None,
                warnings: Vec::new(),
                stats: ScanStats::new(),
                tracker: ProgressTracker::new(),
                truncated: false,
                completed: false,
                completion: Some(completion),
            }),
            cancel: CancellationToken::new(),
            limiter,
            progress_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        // No caller code runs under the lock, so a poisoned lock still
        // guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    pub fn phase(&self) -> ScanPhase {
        self.lock().phase
    }

    pub fn is_completed(&self) -> bool {
        self.lock().completed
    }

    /// Enumerate storage devices and start listing their root folders.
    pub async fn run(self: Arc<Self>) {
        let mut guard = EnumerationGuard {
            request: Arc::clone(&self),
            armed: true,
        };

        if let Err(message) = self.config.validate() {
            self.finish(Err(ScanError::InvalidConfig { message }));
            return;
        }

        self.set_phase(ScanPhase::Enumerating);

        if !self.camera.supports_filesystem_access() {
            self.finish(Err(ScanError::FilesystemAccessUnavailable));
            return;
        }

        let devices = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            devices = self.camera.storage_devices() => devices,
        };

        let devices = match devices {
            Ok(devices) => devices,
            Err(source) => {
                self.finish(Err(ScanError::StorageEnumeration { source }));
                return;
            }
        };

        if devices.is_empty() {
            self.finish(Err(ScanError::NoStorageDevices));
            return;
        }

        let mut roots = Vec::with_capacity(devices.len());
        let mut missing = Vec::new();
        for device in devices {
            match device.root {
                Some(root) => roots.push(root),
                None => missing.push(ScanWarning::missing_root(device.id)),
            }
        }

        if roots.is_empty() {
            self.finish(Err(ScanError::NoRootFolders));
            return;
        }

        debug!(roots = roots.len(), "Listing storage roots");
        {
            let mut state = self.lock();
            if state.completed {
                return;
            }
            state.warnings.extend(missing);
            for root in &roots {
                state.stats.record_seen(root, 0);
            }
            state.phase = ScanPhase::Traversing;
            state.pending += roots.len();
            state.roots_issued = roots.len();
            state.roots_pending = roots.len();
            state.roots_done = true;
        }

        guard.armed = false;
        for root in roots {
            self.spawn_listing(root, 0);
        }
    }

    /// List `folder`, which sits `depth` levels below its storage root.
    fn spawn_listing(self: &Arc<Self>, folder: FileSystemItem, depth: u32) {
        let request = Arc::clone(self);
        tokio::spawn(async move {
            let guard = ListingGuard {
                request: Arc::clone(&request),
                folder: Some(folder),
                depth,
            };
            request.list(guard).await;
        });
    }

    async fn list(self: &Arc<Self>, mut guard: ListingGuard<C>) {
        let permit = match &self.limiter {
            Some(limiter) => {
                let acquired = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    permit = Arc::clone(limiter).acquire_owned() => permit,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                }
            }
            None => None,
        };

        let Some(folder) = guard.folder.as_ref() else {
            return;
        };
        debug!(path = %folder.path, "Listing folder");

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            result = self.camera.list_children(folder) => result,
        };
        drop(permit);

        self.complete_listing(folder, guard.depth, result);
        guard.folder = None;
    }

    /// Record a listing result and act on it.
    fn complete_listing(
        self: &Arc<Self>,
        folder: &FileSystemItem,
        depth: u32,
        result: Result<Vec<FileSystemItem>, CameraError>,
    ) {
        let step = self.record_listing(folder, depth, result);

        if let Some(progress) = step.progress {
            let _ = self.progress_tx.send(progress);
        }
        for child in step.descend {
            self.spawn_listing(child, depth + 1);
        }
        if let Some(delivery) = step.delivery {
            self.deliver(delivery);
        }
    }

    /// Fold one listing result into the shared state.
    ///
    /// `depth` is the folder's distance from its storage root, so root
    /// listings are exactly the ones at depth 0. Results arriving after the
    /// scan completed are discarded.
    pub(crate) fn record_listing(
        &self,
        folder: &FileSystemItem,
        depth: u32,
        result: Result<Vec<FileSystemItem>, CameraError>,
    ) -> Step {
        // Run the predicate before taking the lock; it is caller code.
        let verdicts: Vec<bool> = match &result {
            Ok(children) => children.iter().map(|child| self.matches(child)).collect(),
            Err(_) => Vec::new(),
        };

        let mut state = self.lock();
        if state.completed {
            debug!(path = %folder.path, "Discarding listing after completion");
            return Step::default();
        }

        let mut step = Step::default();
        let mut outcome = None;
        let is_root = depth == 0;
        if is_root {
            state.roots_pending = state.roots_pending.saturating_sub(1);
        }

        match result {
            Ok(children) => {
                state.stats.record_listing();
                state.tracker.record_listing(&folder.path, children.len());

                for (child, matched) in children.into_iter().zip(verdicts) {
                    state.stats.record_seen(&child, depth + 1);

                    if matched && !state.matches.contains_key(&child.path) {
                        state.stats.record_match(&child);
                        state.tracker.record_match();
                        state.matches.insert(child.path.clone(), child.clone());

                        if self.config.is_result_limit_reached(state.matches.len()) {
                            debug!(limit = ?self.config.max_results, "Result limit reached");
                            state.truncated = true;
                            break;
                        }
                    }

                    if child.is_folder() && self.config.should_descend(depth + 1) {
                        step.descend.push(child);
                    }
                }
            }
            Err(source) => {
                warn!(path = %folder.path, error = %source, "Folder listing failed");
                state.tracker.record_error(&folder.path);
                state
                    .warnings
                    .push(ScanWarning::listing_failed(folder.path.clone(), &*source));

                if is_root {
                    state.roots_failed += 1;
                }

                if state.roots_done && state.roots_failed == state.roots_issued {
                    outcome = Some(Err(ScanError::NoRootFolders));
                } else if state.first_error.is_none() {
                    state.first_error = Some(ScanError::listing(folder.path.clone(), source));
                }
            }
        }

        // A failed root is only reported once no other root can still fail,
        // so an unlistable root level always ends in NoRootFolders.
        if outcome.is_none()
            && self.config.error_policy == ErrorPolicy::FailFast
            && (state.roots_pending == 0 || !is_root)
        {
            outcome = state.first_error.take().map(Err);
        }

        state.pending = state.pending.saturating_sub(1);

        if outcome.is_none() && state.truncated {
            outcome = Some(Ok(()));
        }
        if outcome.is_some() {
            step.descend.clear();
        }
        state.pending += step.descend.len();

        if outcome.is_none() && state.roots_done && state.pending == 0 {
            outcome = Some(Ok(()));
        }

        step.progress = Some(state.tracker.snapshot(state.phase, state.pending));
        if let Some(outcome) = outcome {
            step.delivery = self.settle(&mut state, outcome);
        }
        step
    }

    fn matches(&self, item: &FileSystemItem) -> bool {
        match &self.predicate {
            None => item.is_file(),
            Some(_) if item.is_folder() && !self.config.include_matching_folders => false,
            Some(predicate) => predicate(item),
        }
    }

    /// Mark the scan completed and package its outcome.
    ///
    /// `Ok(())` means "deliver the accumulated matches". Returns `None` if
    /// the scan had already completed.
    fn settle(&self, state: &mut ScanState, outcome: Result<(), ScanError>) -> Option<Delivery> {
        if state.completed {
            return None;
        }
        state.completed = true;
        state.phase = ScanPhase::Finalizing;

        let outcome = outcome.map(|()| {
            let items = std::mem::take(&mut state.matches).into_values().collect();
            ScanReport::new(
                items,
                self.config.clone(),
                std::mem::take(&mut state.stats),
                state.tracker.elapsed(),
                std::mem::take(&mut state.warnings),
                state.truncated,
            )
        });

        state
            .completion
            .take()
            .map(|completion| Delivery { completion, outcome })
    }

    /// Finish the scan with `outcome` unless it already completed.
    pub(crate) fn finish(&self, outcome: Result<(), ScanError>) {
        let delivery = {
            let mut state = self.lock();
            self.settle(&mut state, outcome)
        };
        if let Some(delivery) = delivery {
            self.deliver(delivery);
        }
    }

    /// Abandon outstanding listings and invoke the completion.
    fn deliver(&self, delivery: Delivery) {
        self.cancel.cancel();
        if let Some(limiter) = &self.limiter {
            limiter.close();
        }

        match &delivery.outcome {
            Ok(report) => info!(
                matched = report.len(),
                warnings = report.warnings.len(),
                truncated = report.truncated,
                elapsed = ?report.scan_duration,
                "Scan complete"
            ),
            Err(error) => info!(%error, "Scan failed"),
        }

        (delivery.completion)(delivery.outcome);

        let progress = {
            let mut state = self.lock();
            state.phase = ScanPhase::Completed;
            state.tracker.snapshot(state.phase, state.pending)
        };
        let _ = self.progress_tx.send(progress);
    }

    fn set_phase(&self, phase: ScanPhase) {
        let progress = {
            let mut state = self.lock();
            if state.completed {
                return;
            }
            state.phase = phase;
            state.tracker.snapshot(state.phase, state.pending)
        };
        let _ = self.progress_tx.send(progress);
    }

    /// Register `count` listings as issued by the root enumeration.
    #[cfg(test)]
    pub(crate) fn issue_roots(&self, count: usize) {
        let mut state = self.lock();
        state.phase = ScanPhase::Traversing;
        state.pending += count;
        state.roots_issued = count;
        state.roots_pending = count;
        state.roots_done = true;
    }
}

/// Fails the scan if `run` ends before the root listings were issued, for
/// example because the camera panicked while enumerating storage.
struct EnumerationGuard<C: Camera + ?Sized + 'static> {
    request: Arc<ScanRequest<C>>,
    armed: bool,
}

impl<C: Camera + ?Sized + 'static> Drop for EnumerationGuard<C> {
    fn drop(&mut self) {
        if self.armed {
            self.request.finish(Err(ScanError::StorageEnumeration {
                source: "storage enumeration ended without a result".into(),
            }));
        }
    }
}

/// Records a listing as failed if its task ends without recording a result,
/// for example because the camera or the predicate panicked.
struct ListingGuard<C: Camera + ?Sized + 'static> {
    request: Arc<ScanRequest<C>>,
    folder: Option<FileSystemItem>,
    depth: u32,
}

impl<C: Camera + ?Sized + 'static> Drop for ListingGuard<C> {
    fn drop(&mut self) {
        if let Some(folder) = self.folder.take() {
            let step = self.request.record_listing(
                &folder,
                self.depth,
                Err("listing task ended without a result".into()),
            );
            if let Some(delivery) = step.delivery {
                self.request.deliver(delivery);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use camscan_core::{MockCamera, StorageId};

    use crate::predicate;

    type Outcomes = Arc<StdMutex<Vec<Result<ScanReport, ScanError>>>>;

    fn request(
        predicate: Option<Predicate>,
        config: ScanConfig,
    ) -> (Arc<ScanRequest<MockCamera>>, Outcomes) {
        let outcomes: Outcomes = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        let request = ScanRequest::new(
            Arc::new(MockCamera::new()),
            predicate,
            config,
            Box::new(move |outcome| sink.lock().unwrap().push(outcome)),
        );
        (Arc::new(request), outcomes)
    }

    fn folder(storage: u32, path: &str) -> FileSystemItem {
        FileSystemItem::new_folder(ItemPath::new(StorageId::new(storage), path))
    }

    fn file(storage: u32, path: &str) -> FileSystemItem {
        FileSystemItem::new_file(ItemPath::new(StorageId::new(storage), path), 1)
    }

    fn deliver_all(request: &ScanRequest<MockCamera>, step: Step) {
        if let Some(delivery) = step.delivery {
            request.deliver(delivery);
        }
    }

    #[test]
    fn test_completes_when_pending_drains() {
        let (request, outcomes) = request(None, ScanConfig::new());
        request.issue_roots(1);

        let root = folder(1, "/");
        let step = request.record_listing(
            &root,
            0,
            Ok(vec![folder(1, "/DCIM"), file(1, "/README.TXT")]),
        );
        assert_eq!(step.descend.len(), 1);
        assert!(step.delivery.is_none());

        let step = request.record_listing(&folder(1, "/DCIM"), 1, Ok(vec![file(1, "/DCIM/A.JPG")]));
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let report = outcomes[0].as_ref().unwrap();
        assert_eq!(report.len(), 2);
        assert!(request.is_completed());
        assert_eq!(request.phase(), ScanPhase::Completed);
    }

    fn fail_fast() -> ScanConfig {
        ScanConfig::builder()
            .error_policy(ErrorPolicy::FailFast)
            .build()
            .unwrap()
    }

    #[test]
    fn test_late_results_are_discarded() {
        let (request, outcomes) = request(None, fail_fast());
        request.issue_roots(1);

        let children = vec![folder(1, "/A"), folder(1, "/B")];
        let step = request.record_listing(&folder(1, "/"), 0, Ok(children));
        assert_eq!(step.descend.len(), 2);

        let step = request.record_listing(&folder(1, "/A"), 1, Err("card removed".into()));
        deliver_all(&request, step);

        let late = request.record_listing(&folder(1, "/B"), 1, Ok(vec![folder(1, "/B/C")]));
        assert!(late.delivery.is_none());
        assert!(late.descend.is_empty());

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ScanError::Listing { .. })));
    }

    #[test]
    fn test_fail_fast_waits_for_remaining_roots() {
        let (request, outcomes) = request(None, fail_fast());
        request.issue_roots(2);

        let step = request.record_listing(&folder(1, "/"), 0, Err("card removed".into()));
        assert!(step.delivery.is_none());

        let step = request.record_listing(&folder(2, "/"), 0, Ok(vec![folder(2, "/DCIM")]));
        assert!(step.descend.is_empty());
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            Err(ScanError::Listing { path, .. }) => assert_eq!(path.storage, StorageId::new(1)),
            other => panic!("Expected listing error, got {other:?}"),
        }
    }

    #[test]
    fn test_fail_fast_all_roots_failing_is_structural() {
        let (request, outcomes) = request(None, fail_fast());
        request.issue_roots(2);

        let step = request.record_listing(&folder(1, "/"), 0, Err("unreadable".into()));
        assert!(step.delivery.is_none());
        let step = request.record_listing(&folder(2, "/"), 0, Err("unreadable".into()));
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ScanError::NoRootFolders)));
    }

    #[test]
    fn test_all_roots_failing_is_structural() {
        let (request, outcomes) = request(None, ScanConfig::new());
        request.issue_roots(2);

        let step = request.record_listing(&folder(1, "/"), 0, Err("unreadable".into()));
        assert!(step.delivery.is_none());
        let step = request.record_listing(&folder(2, "/"), 0, Err("unreadable".into()));
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ScanError::NoRootFolders)));
    }

    #[test]
    fn test_roots_are_recognised_by_depth_not_path() {
        for policy in [ErrorPolicy::Tolerant, ErrorPolicy::FailFast] {
            let config = ScanConfig::builder().error_policy(policy).build().unwrap();
            let (request, outcomes) = request(None, config);
            request.issue_roots(2);

            let first = folder(1, "/store_0001");
            let step = request.record_listing(&first, 0, Err("unreadable".into()));
            assert!(step.delivery.is_none());
            let second = folder(2, "/store_0002");
            let step = request.record_listing(&second, 0, Err("unreadable".into()));
            deliver_all(&request, step);

            let outcomes = outcomes.lock().unwrap();
            assert_eq!(outcomes.len(), 1);
            assert!(matches!(outcomes[0], Err(ScanError::NoRootFolders)), "{policy:?}");
        }
    }

    #[test]
    fn test_depth_is_measured_from_the_root_listing() {
        let config = ScanConfig::builder().max_depth(Some(2u32)).build().unwrap();
        let (request, outcomes) = request(None, config);
        request.issue_roots(1);

        let step = request.record_listing(
            &folder(1, "/store_0001"),
            0,
            Ok(vec![folder(1, "/store_0001/DCIM")]),
        );
        assert_eq!(step.descend.len(), 1);

        let step = request.record_listing(
            &folder(1, "/store_0001/DCIM"),
            1,
            Ok(vec![
                folder(1, "/store_0001/DCIM/100CANON"),
                file(1, "/store_0001/DCIM/A.JPG"),
            ]),
        );
        assert!(step.descend.is_empty());
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        let report = outcomes[0].as_ref().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.stats.max_depth, 2);
    }

    #[test]
    fn test_duplicate_items_are_collapsed() {
        let (request, outcomes) = request(Some(predicate::extension(["JPG"])), ScanConfig::new());
        request.issue_roots(2);

        let root = folder(1, "/");
        let step = request.record_listing(&root, 0, Ok(vec![file(1, "/A.JPG"), file(1, "/A.JPG")]));
        assert!(step.delivery.is_none());
        let step = request.record_listing(&root, 0, Ok(vec![file(1, "/A.JPG")]));
        deliver_all(&request, step);

        let outcomes = outcomes.lock().unwrap();
        let report = outcomes[0].as_ref().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.stats.items_matched, 1);
    }

    #[test]
    fn test_unissued_listing_does_not_underflow() {
        let (request, outcomes) = request(None, ScanConfig::new());

        let step = request.record_listing(&folder(1, "/DCIM"), 1, Ok(vec![file(1, "/DCIM/A.JPG")]));
        assert!(step.delivery.is_none());
        assert!(outcomes.lock().unwrap().is_empty());

        // Roots issued afterwards still drain to a single completion
        request.issue_roots(1);
        let step = request.record_listing(&folder(1, "/"), 0, Ok(Vec::new()));
        deliver_all(&request, step);
        assert_eq!(outcomes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let (request, outcomes) = request(None, ScanConfig::new());
        request.finish(Err(ScanError::Cancelled));
        request.finish(Err(ScanError::Cancelled));
        request.finish(Ok(()));

        assert_eq!(outcomes.lock().unwrap().len(), 1);
        assert!(request.cancel.is_cancelled());
    }

    #[test]
    fn test_concurrent_listings_never_lose_or_duplicate() {
        const LISTINGS: usize = 64;
        const FILES_PER_LISTING: usize = 50;

        let (request, outcomes) = request(None, ScanConfig::new());
        request.issue_roots(LISTINGS);

        std::thread::scope(|scope| {
            for n in 0..LISTINGS {
                let request = &request;
                scope.spawn(move || {
                    // Every other listing repeats its neighbour's files.
                    let owner = n - n % 2;
                    let files = (0..FILES_PER_LISTING)
                        .map(|i| file(1, &format!("/F{owner:03}/IMG_{i:04}.JPG")))
                        .collect();
                    let listed = folder(1, &format!("/F{n:03}"));
                    let step = request.record_listing(&listed, 0, Ok(files));
                    deliver_all(request, step);
                });
            }
        });

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let report = outcomes[0].as_ref().unwrap();

        let unique: HashSet<_> = report.items.iter().map(|i| i.path.clone()).collect();
        assert_eq!(report.len(), LISTINGS / 2 * FILES_PER_LISTING);
        assert_eq!(unique.len(), report.len());
        assert_eq!(report.stats.folders_listed, LISTINGS as u64);
    }
}
