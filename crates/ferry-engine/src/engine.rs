use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ferry_catalog::{Catalog, CatalogEntry};
use ferry_fetch::{HttpClient, TransferRequest, TransferSession};
use ferry_fs::{FileKind, StorageLayout};
use ferry_verify::Verdict;
use futures_util::FutureExt;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tokio::task::JoinError;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::registry::{Claim, Registry};
use crate::{
    AcquireError, EngineConfig, EngineError, Result, Snapshot, StateEvent, TransferHandle, TransferState,
};

/// Acquires catalog entries into local storage.
///
/// Each acquisition runs as its own tokio task: resume from whatever the
/// staging file holds, stream the rest, verify, then rename into place.
/// Failures never escape a run; they end as [`TransferState::Error`] in the
/// registry, which every subscriber sees.
///
/// Cloning is cheap and every clone drives the same registry.
pub struct Engine<H, K> {
    shared: Arc<Shared<H, K>>,
}

impl<H, K> Clone for Engine<H, K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<H, K> {
    client:   H,
    catalog:  K,
    layout:   StorageLayout,
    registry: Registry,
    config:   EngineConfig,
    /// Serializes claim, cancel and delete for one entry id.
    gates:    parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<H, K> Engine<H, K>
where
    H: HttpClient + 'static,
    K: Catalog + 'static,
{
    /// Create the storage directory and recover per-entry state from it.
    pub fn new(client: H, catalog: K, config: EngineConfig) -> Result<Self> {
        let layout = StorageLayout::new(&config.storage_dir);
        layout.ensure_root()?;

        let engine = Self {
            shared: Arc::new(Shared {
                client,
                catalog,
                layout,
                registry: Registry::new(config.event_capacity),
                config,
                gates: parking_lot::Mutex::new(HashMap::new()),
            }),
        };
        engine.recover()?;
        Ok(engine)
    }

    /// Re-derive every idle entry's state from the storage directory.
    ///
    /// A non-empty final file means `Complete`; anything else is `Idle`, with
    /// any staging file kept for resume. Entries with an active run are left
    /// alone. Files that belong to no catalog entry are reported, not touched.
    pub fn recover(&self) -> Result<()> {
        let layout = &self.shared.layout;
        let mut known = HashSet::new();

        for entry in self.shared.catalog.list_entries() {
            let name = entry.target_filename();
            known.insert(name.to_string());

            let state = if layout.is_complete(name) {
                TransferState::Complete {
                    final_path: layout.final_path(name)?,
                }
            } else {
                let staged = layout.resume_offset(name)?;
                if staged > 0 {
                    debug!(entry = entry.id(), staged, "found resumable staging file");
                }
                TransferState::Idle
            };
            self.shared.registry.set_unclaimed(entry.id(), state);
        }

        for file in layout.scan()? {
            if !known.contains(&file.name) {
                match file.kind {
                    FileKind::Staging => {
                        warn!(file = %file.name, bytes = file.len, "orphan staging file in storage directory")
                    }
                    FileKind::Final => debug!(file = %file.name, "file in storage directory is not in the catalog"),
                }
            }
        }

        Ok(())
    }

    /// Start acquiring `id`, or attach to the run already in flight.
    ///
    /// An entry whose final file is already on disk resolves to `Complete`
    /// without touching the network.
    pub async fn acquire(&self, id: &str) -> Result<TransferHandle> {
        let entry = self.entry(id)?;

        loop {
            let gate = self.gate(id);
            let guard = gate.lock().await;

            let handle = match self.shared.registry.claim(id) {
                Claim::Attached(handle) => {
                    debug!(entry = id, "attaching to the active run");
                    return Ok(handle);
                }
                Claim::Draining(previous) => {
                    drop(guard);
                    debug!(entry = id, "waiting for the cancelled run to release the staging file");
                    previous.wait().await;
                    continue;
                }
                Claim::Claimed(handle) => handle,
            };

            let registry = &self.shared.registry;
            let name = entry.target_filename().to_string();
            let on_disk = self
                .shared
                .on_disk(move |layout| layout.is_complete(&name).then(|| layout.final_path(&name)))
                .await
                .unwrap_or(None);
            if let Some(final_path) = on_disk {
                let state = match final_path {
                    Ok(final_path) => TransferState::Complete { final_path },
                    Err(e) => TransferState::Error { message: e.to_string() },
                };
                registry.finish(id, handle.generation(), state);
                return Ok(handle);
            }

            registry.update(id, handle.generation(), TransferState::downloading(0, entry.expected_size_bytes()));
            self.spawn_run(entry, handle.clone());
            return Ok(handle);
        }
    }

    /// Cancel the active run for `id`, keeping its staging file.
    ///
    /// Waits until the run has stopped. Returns `false` when nothing was running.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        self.entry(id)?;

        let handle = {
            let gate = self.gate(id);
            let _guard = gate.lock().await;
            let Some(handle) = self.shared.registry.active(id) else {
                return Ok(false);
            };
            handle.cancel();
            handle
        };

        info!(entry = id, "cancellation requested");
        handle.wait().await;
        Ok(true)
    }

    /// Cancel every active run without waiting for them to stop.
    pub fn cancel_all(&self) -> Vec<TransferHandle> {
        let runs = self.shared.registry.active_runs();
        for run in &runs {
            run.cancel();
        }
        runs
    }

    /// Remove the final and staging files for `id` and reset it to `Idle`.
    ///
    /// An active run is cancelled and awaited first; no new run can claim the
    /// entry until the files are gone.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let gate = self.gate(id);
        let _guard = gate.lock().await;

        if let Some(run) = self.shared.registry.active(id) {
            run.cancel();
            run.wait().await;
        }

        self.shared.layout.delete(entry.target_filename())?;
        self.shared.registry.set_unclaimed(id, TransferState::Idle);
        info!(entry = id, "deleted");
        Ok(())
    }

    /// Current state of `id`, or `None` when the catalog does not know it.
    pub fn current_state(&self, id: &str) -> Option<TransferState> {
        self.shared.catalog.find_entry(id)?;
        Some(self.shared.registry.state(id).unwrap_or_default())
    }

    pub fn is_complete(&self, id: &str) -> bool { self.current_state(id).is_some_and(|s| s.is_complete()) }

    /// Bytes of `id` already on disk in its staging file.
    pub fn staged_bytes(&self, id: &str) -> Result<u64> {
        let entry = self.entry(id)?;
        Ok(self.shared.layout.resume_offset(entry.target_filename())?)
    }

    /// Handle of the run currently owning `id`, if any.
    pub fn active(&self, id: &str) -> Option<TransferHandle> { self.shared.registry.active(id) }

    pub fn snapshot(&self) -> Snapshot { self.shared.registry.snapshot() }

    /// Full-registry snapshots. Rapid progress updates coalesce to the latest.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> { self.shared.registry.subscribe() }

    /// Every state change in order, subject to the configured buffer.
    pub fn events(&self) -> broadcast::Receiver<StateEvent> { self.shared.registry.events() }

    pub fn catalog(&self) -> &K { &self.shared.catalog }

    pub fn storage_dir(&self) -> &Path { self.shared.layout.root() }

    pub fn config(&self) -> &EngineConfig { &self.shared.config }

    fn entry(&self, id: &str) -> Result<Arc<CatalogEntry>> {
        self.shared
            .catalog
            .find_entry(id)
            .ok_or_else(|| EngineError::UnknownEntry(id.to_string()))
    }

    fn gate(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.shared.gates.lock();
        Arc::clone(gates.entry(id.to_string()).or_default())
    }

    fn spawn_run(&self, entry: Arc<CatalogEntry>, handle: TransferHandle) {
        let shared = Arc::clone(&self.shared);
        let span = info_span!("acquire", entry = %entry.id());

        tokio::spawn(
            async move {
                let run = AssertUnwindSafe(shared.run(&entry, &handle)).catch_unwind().await;
                let state = match run {
                    Ok(state) => state,
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        shared.discard(&entry).await;
                        TransferState::Error {
                            message: AcquireError::Panicked(reason).to_string(),
                        }
                    }
                };
                shared.registry.finish(entry.id(), handle.generation(), state);
            }
            .instrument(span),
        );
    }
}

impl<H, K> Shared<H, K>
where
    H: HttpClient + 'static,
    K: Catalog + 'static,
{
    /// Drive one run to its terminal state.
    async fn run(&self, entry: &CatalogEntry, handle: &TransferHandle) -> TransferState {
        match self.attempt(entry, handle).await {
            Ok(final_path) => {
                info!(path = %final_path.display(), "download complete");
                TransferState::Complete { final_path }
            }
            Err(AcquireError::Cancelled) => {
                info!("cancelled; staging file kept for resume");
                TransferState::Idle
            }
            Err(e @ AcquireError::Commit(_)) => {
                warn!(error = %e, "commit failed; staging file kept for retry");
                TransferState::Error { message: e.to_string() }
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "download failed");
                self.discard(entry).await;
                TransferState::Error { message: e.to_string() }
            }
        }
    }

    async fn attempt(&self, entry: &CatalogEntry, handle: &TransferHandle) -> std::result::Result<PathBuf, AcquireError> {
        let id = entry.id();
        let name = entry.target_filename();
        let staging = self.layout.staging_path(name)?;
        let meta = self.layout.meta_path(name)?;
        let generation = handle.generation();

        let request = TransferRequest {
            url:          entry.source_url().as_str(),
            staging_path: &staging,
            meta_path:    Some(&meta),
        };
        let session = TransferSession::new(&self.client, handle.token()).with_chunk_size(self.config.chunk_size());

        let mut throttle = Throttle::new(self.config.progress_interval());
        let outcome = session
            .run(&request, |done, total| {
                if throttle.ready(done, total) {
                    self.registry.update(id, generation, TransferState::downloading(done, total));
                }
            })
            .await?;

        debug!(
            bytes = outcome.bytes_written,
            resumed_from = outcome.resumed_from,
            "stream finished"
        );
        if let Some(expected) = entry.expected_size_bytes()
            && expected != outcome.bytes_written
        {
            warn!(expected, actual = outcome.bytes_written, "size differs from the catalog");
        }

        self.registry.update(id, generation, TransferState::Verifying);
        self.verify(entry, &staging, handle).await?;

        if handle.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }
        let name = name.to_string();
        self.on_disk(move |layout| layout.commit(&name))
            .await
            .map_err(|e| AcquireError::Panicked(e.to_string()))?
            .map_err(AcquireError::Commit)
    }

    async fn verify(&self, entry: &CatalogEntry, staging: &Path, handle: &TransferHandle) -> std::result::Result<(), AcquireError> {
        let path = staging.to_path_buf();
        let expected = entry.expected_digest().to_string();
        let cancel = handle.token();

        let verdict = tokio::task::spawn_blocking(move || {
            ferry_verify::verify_file_with(&path, &expected, || cancel.is_cancelled())
        })
        .await
        .map_err(|e| AcquireError::Panicked(e.to_string()))??;

        match verdict {
            Verdict::Skipped => warn!("no expected digest; accepted without verification"),
            Verdict::Matched(digest) => debug!(%digest, "digest verified"),
        }
        Ok(())
    }

    async fn discard(&self, entry: &CatalogEntry) {
        let name = entry.target_filename().to_string();
        match self.on_disk(move |layout| layout.discard(&name)).await {
            Ok(Ok(())) => debug!("staging file discarded"),
            Ok(Err(e)) => warn!(error = %e, "failed to discard staging file"),
            Err(e) => warn!(error = %e, "staging cleanup task failed"),
        }
    }
}

impl<H, K> Shared<H, K> {
    /// Run blocking storage work off the async worker threads.
    async fn on_disk<T, F>(&self, op: F) -> std::result::Result<T, JoinError>
    where
        T: Send + 'static,
        F: FnOnce(&StorageLayout) -> T + Send + 'static,
    {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || op(&layout)).await
    }
}

/// Limits how often progress is published.
///
/// The first and the final report always pass.
struct Throttle {
    interval: Duration,
    last:     Option<Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self { Self { interval, last: None } }

    fn ready(&mut self, done: u64, total: Option<u64>) -> bool {
        let now = Instant::now();
        let due = match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due || total == Some(done) {
            self.last = Some(now);
            return true;
        }
        false
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}
