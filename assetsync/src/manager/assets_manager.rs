//! The update orchestrator.
//!
//! [`AssetsManager`] owns the local and remote manifests, feeds inputs to the
//! [`UpdateMachine`], and performs the effects it returns. Transfers run on
//! downloader threads; their events come back over a channel and are only
//! applied when the owning thread calls [`AssetsManager::process_events`] or
//! [`AssetsManager::wait_for_event`].

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};

use super::batch::Batch;
use super::error::{ManagerError, ManagerResult};
use super::event::{EventListener, UpdateErrorCode, UpdateEvent};
use super::state::{
    Comparison, Effect, Facts, Input, UpdateMachine, UpdateState, MANIFEST_ID, VERSION_ID,
};
use crate::config::ManagerConfig;
use crate::download::{
    Cancellation, DownloadEvent, DownloadEventKind, DownloadUnit, Downloader, LaunchId,
    ReqwestTransport, Transport, DEFAULT_READ_TIMEOUT,
};
use crate::manifest::{Asset, Manifest};
use crate::storage::{StorageError, StorageRoot};

/// Drives manifest-based updates of a storage root.
///
/// All state transitions happen on the thread that calls into the manager.
/// The local manifest is only ever replaced wholesale, after every unit of a
/// batch has succeeded; holders of [`AssetsManager::local_manifest`] keep
/// seeing the manifest they were given.
pub struct AssetsManager {
    config: ManagerConfig,
    storage: StorageRoot,
    downloader: Downloader,
    listener: Box<dyn EventListener>,
    machine: UpdateMachine,
    local: Arc<Manifest>,
    remote: Manifest,
    search_paths: Vec<PathBuf>,
    batch: Option<Batch>,
    planned_downloads: Vec<DownloadUnit>,
    planned_deletions: Vec<Asset>,
    version_launch: Option<LaunchId>,
    manifest_launch: Option<LaunchId>,
    next_launch: u64,
    /// Cancellation of every launch whose workers may still be running.
    launches: BTreeMap<LaunchId, Cancellation>,
    /// Inputs left over when a call hit the transition step limit.
    queue: VecDeque<Input>,
    events_tx: UnboundedSender<DownloadEvent>,
    events_rx: UnboundedReceiver<DownloadEvent>,
}

impl std::fmt::Debug for AssetsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetsManager")
            .field("storage", &self.storage)
            .field("state", &self.machine.state())
            .field("local_version", &self.local.version_id())
            .field("remote_version", &self.remote.version_id())
            .finish_non_exhaustive()
    }
}

impl AssetsManager {
    /// Create a manager and load its local manifest.
    ///
    /// The cached manifest under the storage root is preferred; a cached
    /// manifest that fails to parse is deleted and the bundled one is used
    /// instead. If neither loads, `no-local-manifest` is emitted and every
    /// update call is refused until [`AssetsManager::reload_local_manifest`]
    /// succeeds.
    pub fn new(
        config: ManagerConfig,
        transport: Arc<dyn Transport>,
        listener: impl EventListener + 'static,
    ) -> ManagerResult<Self> {
        let storage = StorageRoot::new(&config.storage_root);
        storage.ensure_exists()?;

        let downloader = Downloader::new(transport, storage.clone())
            .with_stall_policy(config.stall_policy)
            .with_max_concurrent(config.max_concurrent_downloads);
        let (events_tx, events_rx) = unbounded_channel();

        let mut manager = Self {
            config,
            storage,
            downloader,
            listener: Box::new(listener),
            machine: UpdateMachine::new(),
            local: Arc::new(Manifest::new()),
            remote: Manifest::new(),
            search_paths: Vec::new(),
            batch: None,
            planned_downloads: Vec::new(),
            planned_deletions: Vec::new(),
            version_launch: None,
            manifest_launch: None,
            next_launch: 0,
            launches: BTreeMap::new(),
            queue: VecDeque::new(),
            events_tx,
            events_rx,
        };

        if let Err(e) = manager.load_local_manifest() {
            debug!(error = %e, "starting without a local manifest");
        }

        Ok(manager)
    }

    /// Create a manager that fetches over HTTP.
    pub fn with_http(
        config: ManagerConfig,
        listener: impl EventListener + 'static,
    ) -> ManagerResult<Self> {
        let read_timeout = config.stall_policy.window.max(DEFAULT_READ_TIMEOUT);
        let transport = ReqwestTransport::with_timeouts(config.connect_timeout, read_timeout)?;
        Self::new(config, Arc::new(transport), listener)
    }

    /// Start or continue checking for a new version.
    pub fn check_update(&mut self) {
        self.drive(Input::CheckUpdate);
    }

    /// Start or continue updating to the remote version.
    ///
    /// While a batch is running this is a no-op. Once a batch has settled
    /// with failed units, this relaunches exactly those units.
    pub fn update(&mut self) {
        self.drive(Input::Update);
    }

    /// Current state, with intermediate checking stages reported as
    /// [`UpdateState::Checking`].
    pub fn update_state(&self) -> UpdateState {
        self.machine.state().reported()
    }

    /// Apply every download event that has already arrived.
    ///
    /// Returns the number of events consumed.
    pub fn process_events(&mut self) -> usize {
        let mut consumed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_download_event(event);
            consumed += 1;
        }
        consumed
    }

    /// Block until one download event arrives and apply it.
    ///
    /// Inputs deferred by the transition step limit are resumed first,
    /// without blocking. Returns `false` without blocking when nothing is in
    /// flight. Must not be called from within an async runtime.
    pub fn wait_for_event(&mut self) -> bool {
        if !self.queue.is_empty() {
            self.drive_all(Vec::new());
            return true;
        }
        if !self.has_pending_work() {
            return false;
        }
        match self.events_rx.blocking_recv() {
            Some(event) => {
                self.handle_download_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until nothing is in flight.
    pub fn run_until_idle(&mut self) {
        while self.wait_for_event() {}
    }

    /// Whether any live fetch or batch unit has yet to report an outcome,
    /// or deferred inputs are waiting to be processed.
    pub fn has_pending_work(&self) -> bool {
        !self.queue.is_empty()
            || self.version_launch.is_some()
            || self.manifest_launch.is_some()
            || self.batch.as_ref().map_or(false, |b| b.in_flight() > 0)
    }

    /// Full local path of an asset in the current local manifest.
    ///
    /// Assets whose path would leave the storage root have none.
    pub fn get(&self, key: &str) -> Option<PathBuf> {
        let asset = self.local.asset(key)?;
        self.storage.resolve(&asset.path).ok()
    }

    /// Directories to search for assets, most specific first.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// The authoritative local manifest.
    pub fn local_manifest(&self) -> Arc<Manifest> {
        Arc::clone(&self.local)
    }

    /// The remote manifest being checked or applied, possibly empty.
    pub fn remote_manifest(&self) -> &Manifest {
        &self.remote
    }

    pub fn storage_root(&self) -> &Path {
        self.storage.path()
    }

    /// Ids of batch units that failed and await a retry.
    pub fn failed_units(&self) -> Vec<String> {
        self.batch
            .as_ref()
            .map(|b| b.failed().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Abandon any update in progress and load the local manifest again.
    pub fn reload_local_manifest(&mut self) -> ManagerResult<()> {
        self.abandon();
        self.load_local_manifest()
    }

    /// Delete everything under the storage root and fall back to the
    /// bundled manifest.
    ///
    /// Returns the number of top-level entries removed.
    pub fn clear_storage(&mut self) -> ManagerResult<usize> {
        self.abandon();
        let removed = self.storage.clear()?;
        info!(removed, root = %self.storage.path().display(), "storage cleared");
        self.load_local_manifest()?;
        Ok(removed)
    }

    /// Drop the update in progress.
    ///
    /// Workers of cancelled launches may keep running, but can no longer
    /// change anything under the storage root.
    fn abandon(&mut self) {
        self.cancel_launches();
        self.queue.clear();
        self.machine.reset();
        self.clear_remote();
        self.batch = None;
    }

    fn cancel_launches(&mut self) {
        for (launch, cancel) in std::mem::take(&mut self.launches) {
            trace!(%launch, "cancelling launch");
            cancel.cancel();
        }
    }

    fn load_local_manifest(&mut self) -> ManagerResult<()> {
        let cached = self.storage.cached_manifest_path();
        if cached.exists() {
            match Manifest::from_file(&cached) {
                Ok(manifest) => {
                    info!(version = %manifest.version_id(), "loaded cached manifest");
                    self.set_local(manifest);
                    return Ok(());
                }
                Err(e) => {
                    warn!(path = %cached.display(), error = %e, "discarding unreadable cached manifest");
                    if let Err(e) = self.storage.remove_file(&cached) {
                        warn!(error = %e, "failed to remove cached manifest");
                    }
                }
            }
        }

        let bundled = self.config.bundled_manifest.clone();
        match Manifest::from_file(&bundled) {
            Ok(manifest) => {
                info!(version = %manifest.version_id(), "loaded bundled manifest");
                self.set_local(manifest);
                Ok(())
            }
            Err(e) => {
                warn!(path = %bundled.display(), error = %e, "no usable local manifest");
                self.set_local(Manifest::new());
                self.notify_no_local_manifest();
                Err(ManagerError::NoLocalManifest(bundled.display().to_string()))
            }
        }
    }

    fn set_local(&mut self, manifest: Manifest) {
        self.local = Arc::new(manifest);
        self.search_paths = self
            .local
            .search_paths()
            .iter()
            .map(|dir| self.storage.path().join(dir))
            .chain(std::iter::once(self.storage.path().to_path_buf()))
            .collect();
    }

    fn next_launch(&mut self) -> (LaunchId, Cancellation) {
        self.next_launch += 1;
        let launch = LaunchId(self.next_launch);
        let cancel = Cancellation::new();
        self.launches.insert(launch, cancel.clone());
        (launch, cancel)
    }

    fn facts(&self) -> Facts {
        Facts {
            local_loaded: self.local.is_loaded(),
            has_version_url: !self.local.version_file_url().is_empty(),
            has_manifest_url: !self.manifest_url().is_empty(),
            remote_loaded: self.remote.is_loaded(),
            batch_settled_with_failures: self
                .batch
                .as_ref()
                .map_or(false, Batch::is_settled_with_failures),
        }
    }

    /// Remote manifest URL, preferring the one named by a fetched version file.
    fn manifest_url(&self) -> &str {
        if self.remote.is_version_loaded() && !self.remote.manifest_file_url().is_empty() {
            self.remote.manifest_file_url()
        } else {
            self.local.manifest_file_url()
        }
    }

    /// Run `input` and everything it leads to, up to the configured step limit.
    fn drive(&mut self, input: Input) {
        self.drive_all(vec![input]);
    }

    /// Queue `inputs` behind any deferred ones and process the queue.
    ///
    /// Inputs beyond the step limit stay queued for the next call.
    fn drive_all(&mut self, inputs: Vec<Input>) {
        self.queue.extend(inputs);
        let limit = self.config.max_transition_steps.max(1);

        for _ in 0..limit {
            let Some(input) = self.queue.pop_front() else {
                return;
            };

            let before = self.machine.state();
            let facts = self.facts();
            let effects = self.machine.step(input, &facts);
            if self.machine.state() != before {
                debug!(from = %before, to = %self.machine.state(), "state transition");
            }

            for effect in effects {
                if let Some(next) = self.perform(effect) {
                    self.queue.push_back(next);
                }
            }
        }

        if !self.queue.is_empty() {
            warn!(
                deferred = self.queue.len(),
                state = %self.machine.state(),
                "transition step limit reached"
            );
        }
    }

    fn perform(&mut self, effect: Effect) -> Option<Input> {
        match effect {
            Effect::FetchVersion => self.fetch_version(),
            Effect::FetchManifest => self.fetch_manifest(),
            Effect::ParseVersion => return Some(Input::VersionParsed(self.parse_version())),
            Effect::ParseManifest => return Some(Input::ManifestParsed(self.parse_manifest())),
            Effect::ComputeDiff => return Some(self.compute_diff()),
            Effect::LaunchBatch => self.launch_batch(),
            Effect::RetryFailed => self.retry_failed(),
            Effect::Promote => self.promote(),
            Effect::ClearRemote => self.clear_remote(),
            Effect::NotifyNoLocalManifest => self.notify_no_local_manifest(),
            Effect::Notify(event) => self.notify(event),
            Effect::Reenter(input) => return Some(input),
        }
        None
    }

    fn fetch_version(&mut self) {
        let (launch, cancel) = self.next_launch();
        let unit = DownloadUnit::new(
            VERSION_ID,
            self.local.version_file_url(),
            self.storage.version_file_path(),
        );
        info!(%launch, url = %unit.source_url, "fetching version file");
        self.version_launch = Some(launch);
        self.downloader
            .download_async(launch, unit, cancel, self.events_tx.clone());
    }

    fn fetch_manifest(&mut self) {
        let (launch, cancel) = self.next_launch();
        let unit = DownloadUnit::new(
            MANIFEST_ID,
            self.manifest_url(),
            self.storage.staged_manifest_path(),
        );
        info!(%launch, url = %unit.source_url, "fetching remote manifest");
        self.manifest_launch = Some(launch);
        self.downloader
            .download_async(launch, unit, cancel, self.events_tx.clone());
    }

    fn parse_version(&mut self) -> Comparison {
        match self
            .remote
            .parse_version_file(self.storage.version_file_path())
        {
            Ok(()) => self.compare_remote(),
            Err(e) => {
                warn!(error = %e, "version file unusable, checking full manifest instead");
                Comparison::Invalid(e.to_string())
            }
        }
    }

    fn parse_manifest(&mut self) -> Comparison {
        match self.remote.parse_file(self.storage.staged_manifest_path()) {
            Ok(()) => self.compare_remote(),
            Err(e) => {
                error!(error = %e, "remote manifest unusable");
                Comparison::Invalid(e.to_string())
            }
        }
    }

    fn compare_remote(&self) -> Comparison {
        if self.local.version_equals(&self.remote) {
            info!(version = %self.local.version_id(), "local version is current");
            Comparison::Same
        } else {
            info!(
                local = %self.local.version_id(),
                remote = %self.remote.version_id(),
                "new version found"
            );
            Comparison::Differs
        }
    }

    fn compute_diff(&mut self) -> Input {
        let diff = self.local.gen_diff(&self.remote);
        let package_url = self.remote.package_url();

        self.planned_downloads.clear();
        self.planned_deletions.clear();
        for (key, entry) in diff {
            if entry.diff_type.needs_download() {
                // Unresolvable paths are left for the downloader to reject.
                let destination = self.storage.path().join(&entry.asset.path);
                let source = format!("{}{}", package_url, entry.asset.path);
                self.planned_downloads
                    .push(DownloadUnit::new(key, source, destination));
            } else {
                self.planned_deletions.push(entry.asset);
            }
        }

        debug!(
            downloads = self.planned_downloads.len(),
            deletions = self.planned_deletions.len(),
            "diff computed"
        );
        Input::DiffComputed {
            downloads: self.planned_downloads.len(),
            deletions: self.planned_deletions.len(),
        }
    }

    fn launch_batch(&mut self) {
        for asset in std::mem::take(&mut self.planned_deletions) {
            match self.storage.resolve(&asset.path) {
                Ok(path) => match self.storage.remove_file(&path) {
                    Ok(true) => debug!(path = %path.display(), "deleted asset"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "failed to delete asset"),
                },
                Err(e) => warn!(error = %e, "refusing to delete asset"),
            }
        }

        let units = std::mem::take(&mut self.planned_downloads);
        let (launch, cancel) = self.next_launch();
        for unit in &units {
            self.remote.set_asset_updating(&unit.id, true);
        }
        self.batch = Some(Batch::new(launch, &units));

        if units.is_empty() {
            self.launches.remove(&launch);
            return;
        }
        info!(%launch, units = units.len(), "launching update batch");
        self.downloader
            .batch_download(launch, units, cancel, self.events_tx.clone());
    }

    fn retry_failed(&mut self) {
        let Some(previous) = self.batch.as_ref().map(Batch::launch) else {
            return;
        };
        let (launch, cancel) = self.next_launch();
        // Every unit of the previous launch has reported.
        self.launches.remove(&previous);
        let units = self
            .batch
            .as_mut()
            .map(|batch| batch.relaunch_failed(launch))
            .unwrap_or_default();
        info!(%launch, units = units.len(), "retrying failed units");
        self.downloader
            .batch_download(launch, units, cancel, self.events_tx.clone());
    }

    fn promote(&mut self) {
        let staged = self.storage.staged_manifest_path();
        let cached = self.storage.cached_manifest_path();
        if let Err(e) = self.persist_remote(&staged, &cached) {
            error!(error = %e, "failed to persist promoted manifest");
            self.notify(UpdateEvent::Error {
                code: UpdateErrorCode::CreateFile,
                message: e.to_string(),
                asset_id: Some(MANIFEST_ID.to_string()),
            });
        }

        let mut promoted = std::mem::take(&mut self.remote);
        let updating: Vec<String> = promoted
            .assets()
            .iter()
            .filter(|(_, asset)| asset.is_updating())
            .map(|(key, _)| key.clone())
            .collect();
        for key in updating {
            promoted.set_asset_updating(&key, false);
        }

        info!(version = %promoted.version_id(), "local manifest promoted");
        self.set_local(promoted);
        self.batch = None;
        self.version_launch = None;
        self.manifest_launch = None;
        // Every launch of this update has reported.
        self.launches.clear();

        if let Err(e) = self.storage.remove_file(&self.storage.version_file_path()) {
            warn!(error = %e, "failed to remove version file");
        }
    }

    fn persist_remote(&self, staged: &Path, cached: &Path) -> ManagerResult<()> {
        if staged.exists() {
            self.storage.rename(staged, cached)?;
        } else {
            let text = self.remote.to_json_string()?;
            fs::write(cached, text).map_err(|e| StorageError::Io {
                path: cached.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn clear_remote(&mut self) {
        self.remote.clear();
        self.version_launch = None;
        self.manifest_launch = None;
        self.planned_downloads.clear();
        self.planned_deletions.clear();

        for path in [
            self.storage.staged_manifest_path(),
            self.storage.version_file_path(),
        ] {
            if let Err(e) = self.storage.remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove remote file");
            }
        }
    }

    fn notify_no_local_manifest(&mut self) {
        let url = self.config.bundled_manifest.display().to_string();
        self.notify(UpdateEvent::NoLocalManifest { url });
    }

    fn notify(&mut self, event: UpdateEvent) {
        debug!(event = %event.name(), "{}", event);
        self.listener.on_event(&event);
    }

    fn handle_download_event(&mut self, event: DownloadEvent) {
        let inputs = self.route(event);
        if !inputs.is_empty() {
            self.drive_all(inputs);
        }
    }

    /// Translate one download event into state-machine inputs.
    ///
    /// Events from launches that are no longer live yield nothing.
    fn route(&mut self, event: DownloadEvent) -> Vec<Input> {
        let launch = event.launch;

        if self.version_launch == Some(launch) {
            return match event.kind {
                DownloadEventKind::Progress { .. } => Vec::new(),
                DownloadEventKind::Succeeded { .. } => {
                    self.version_launch = None;
                    self.launches.remove(&launch);
                    vec![Input::VersionFetched]
                }
                DownloadEventKind::Failed(err) => {
                    self.version_launch = None;
                    self.launches.remove(&launch);
                    vec![Input::VersionFetchFailed(err)]
                }
            };
        }

        if self.manifest_launch == Some(launch) {
            return match event.kind {
                DownloadEventKind::Progress { .. } => Vec::new(),
                DownloadEventKind::Succeeded { .. } => {
                    self.manifest_launch = None;
                    self.launches.remove(&launch);
                    vec![Input::ManifestFetched]
                }
                DownloadEventKind::Failed(err) => {
                    self.manifest_launch = None;
                    self.launches.remove(&launch);
                    vec![Input::ManifestFetchFailed(err)]
                }
            };
        }

        let Some(batch) = self.batch.as_mut().filter(|b| b.launch() == launch) else {
            trace!(%launch, id = %event.unit_id, "dropping event from stale launch");
            return Vec::new();
        };

        match event.kind {
            DownloadEventKind::Progress { percent, .. } => {
                debug!(id = %event.unit_id, percent, "asset progress");
                Vec::new()
            }
            DownloadEventKind::Succeeded { bytes } => {
                let Some(settled) = batch.record_success(&event.unit_id) else {
                    return Vec::new();
                };
                debug!(id = %event.unit_id, bytes, remaining = settled.remaining, "asset downloaded");
                self.remote.set_asset_updating(&event.unit_id, false);

                let mut inputs = vec![Input::AssetDownloaded {
                    asset_id: event.unit_id,
                    percent: settled.percent,
                }];
                if settled.remaining == 0 {
                    inputs.push(Input::BatchComplete);
                }
                inputs
            }
            DownloadEventKind::Failed(err) => {
                if !batch.record_failure(&event.unit_id) {
                    return Vec::new();
                }
                vec![Input::AssetFailed {
                    asset_id: event.unit_id,
                    error: err,
                }]
            }
        }
    }
}

impl Drop for AssetsManager {
    fn drop(&mut self) {
        self.cancel_launches();
    }
}
