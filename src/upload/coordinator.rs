//! Drives one import session: init, per-slot chunk streams, commit.
//!
//! The coordinator owns every piece of mutable state. The init request,
//! chunk uploads, commit attempts and backoff timers run as spawned tasks that only
//! report back over a channel; [`UploadCoordinator::step`] applies those
//! reports one at a time. Every report carries the epoch of the session
//! that produced it, and cancel/failure bump the epoch, so nothing from
//! an abandoned session can touch the current one.

use crate::api::{ChunkUpload, CommitReceipt, ImportApi};
use crate::config::{ImportConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE};
use crate::error::{Result, UploadError};
use crate::upload::chunker::{read_chunk, ChunkPlan};
use crate::upload::progress::ProgressAggregator;
use crate::upload::retry::RetryPolicy;
use crate::upload::slots::{Slot, SlotManager};
use crate::upload::types::{AssetKind, ImportedTask, SelectedFile, SessionStatus, SlotStatus};
use chrono::{SecondsFormat, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CHUNK_RETRIES_EXHAUSTED: &str =
    "Upload failed after multiple retries. Please check your connection and try again.";
const COMMIT_RETRIES_EXHAUSTED: &str = "Failed to complete upload. Try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub chunk_size: u64,
    pub chunk_retry: RetryPolicy,
    pub commit_retry: RetryPolicy,
    pub max_file_size: u64,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&ImportConfig::default())
    }
}

impl From<&ImportConfig> for CoordinatorOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            chunk_size: if config.chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                config.chunk_size
            },
            chunk_retry: config.chunk_retry_policy(),
            commit_retry: config.commit_retry_policy(),
            max_file_size: if config.max_file_size == 0 {
                DEFAULT_MAX_FILE_SIZE
            } else {
                config.max_file_size
            },
        }
    }
}

#[derive(Debug)]
enum Event {
    Initialized(Result<String>),
    ChunkSent { kind: AssetKind, index: u64, sent: u64 },
    ChunkFailed { kind: AssetKind, error: UploadError },
    ChunkRetryDue { kind: AssetKind },
    Committed(Result<CommitReceipt>),
    CommitRetryDue,
}

#[derive(Debug)]
struct Envelope {
    epoch: u64,
    event: Event,
}

pub struct UploadCoordinator<A: ImportApi> {
    api: Arc<A>,
    options: CoordinatorOptions,
    slots: SlotManager,
    progress: ProgressAggregator,
    status: SessionStatus,
    token: Option<Arc<str>>,
    task_name: Option<String>,
    commit_failures: u32,
    error: Option<UploadError>,
    imported: Option<ImportedTask>,
    epoch: u64,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
    in_flight: Vec<JoinHandle<()>>,
}

impl<A: ImportApi> UploadCoordinator<A> {
    pub fn new(api: Arc<A>, options: CoordinatorOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            options,
            slots: SlotManager::new(options.max_file_size),
            progress: ProgressAggregator::new(),
            status: SessionStatus::Idle,
            token: None,
            task_name: None,
            commit_failures: 0,
            error: None,
            imported: None,
            epoch: 0,
            events_tx,
            events_rx,
            in_flight: Vec::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn slot(&self, kind: AssetKind) -> &Slot {
        self.slots.slot(kind)
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    pub fn imported_task(&self) -> Option<&ImportedTask> {
        self.imported.as_ref()
    }

    pub fn task_name(&self) -> Option<&str> {
        self.task_name.as_deref()
    }

    /// Number of spawned requests and timers that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn select_file(
        &mut self,
        kind: AssetKind,
        file: SelectedFile,
    ) -> Result<Option<SelectedFile>> {
        self.ensure_idle()?;
        let previous = self.slots.select_file(kind, file)?;
        debug!(slot = %kind, "file selected");
        Ok(previous)
    }

    pub fn remove_file(&mut self, kind: AssetKind) -> Result<Option<SelectedFile>> {
        self.ensure_idle()?;
        Ok(self.slots.remove_file(kind))
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.status.is_active() {
            return Err(UploadError::validation("An upload is already in progress."));
        }
        Ok(())
    }

    /// Validates the selection and requests a session token. Returns as
    /// soon as the init request is in flight; drive the session with
    /// [`step`](Self::step) or [`run`](Self::run), or drop it with
    /// [`cancel`](Self::cancel).
    pub fn start(&mut self, name: Option<String>) -> Result<()> {
        self.ensure_idle()?;
        if let Err(err) = self.slots.validate() {
            self.error = Some(err.clone());
            return Err(err);
        }

        self.reset_session();
        for slot in self.slots.selected() {
            let size = slot.file.as_ref().map_or(0, |f| f.size);
            self.progress.track(slot.kind, size);
        }
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(default_task_name);
        info!(
            slots = ?self.slots.selected_kinds(),
            bytes = self.progress.bytes_total(),
            task = %name,
            "starting upload"
        );
        self.task_name = Some(name);
        self.status = SessionStatus::Initializing;

        let api = Arc::clone(&self.api);
        self.spawn_reporting(async move { Event::Initialized(api.init().await) });
        Ok(())
    }

    /// Applies the next transfer report. Returns `false` once the session
    /// is no longer active.
    pub async fn step(&mut self) -> bool {
        if !self.status.is_active() {
            return false;
        }
        // We hold a sender ourselves, so the channel never closes.
        if let Some(envelope) = self.events_rx.recv().await {
            self.apply(envelope);
        }
        self.status.is_active()
    }

    /// Drives the session to completion.
    pub async fn run(&mut self) -> Result<ImportedTask> {
        while self.step().await {}
        self.outcome()
    }

    /// Starts and runs a session in one call.
    pub async fn upload(&mut self, name: Option<String>) -> Result<ImportedTask> {
        self.start(name)?;
        self.run().await
    }

    pub fn outcome(&self) -> Result<ImportedTask> {
        match self.status {
            SessionStatus::Succeeded => self
                .imported
                .clone()
                .ok_or_else(|| UploadError::UnexpectedResponse("missing task".into())),
            SessionStatus::Failed => Err(self
                .error
                .clone()
                .unwrap_or_else(|| UploadError::transport(COMMIT_RETRIES_EXHAUSTED))),
            _ => Err(UploadError::Cancelled),
        }
    }

    /// Drops the session and every selection. Nothing spawned before the
    /// call can change state afterwards.
    pub fn cancel(&mut self) {
        if self.status.is_active() {
            info!(status = ?self.status, "cancelling upload");
        }
        self.abort_in_flight();
        self.slots.clear();
        self.progress.reset();
        self.token = None;
        self.task_name = None;
        self.commit_failures = 0;
        self.error = None;
        self.imported = None;
        self.status = SessionStatus::Idle;
    }

    fn reset_session(&mut self) {
        self.abort_in_flight();
        self.slots.rewind();
        self.progress.reset();
        self.token = None;
        self.commit_failures = 0;
        self.error = None;
        self.imported = None;
    }

    fn abort_in_flight(&mut self) {
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
        self.epoch += 1;
        while self.events_rx.try_recv().is_ok() {}
    }

    fn fail(&mut self, err: UploadError) {
        error!(error = %err, status = ?self.status, "upload failed");
        self.abort_in_flight();
        self.token = None;
        for kind in AssetKind::ALL {
            let slot = self.slots.slot_mut(kind);
            if slot.status == SlotStatus::Uploading {
                slot.status = SlotStatus::Selected;
            }
        }
        self.error = Some(err);
        self.status = SessionStatus::Failed;
    }

    fn apply(&mut self, envelope: Envelope) {
        if envelope.epoch != self.epoch {
            debug!(event = ?envelope.event, "dropping event from an abandoned session");
            return;
        }
        if !self.status.is_active() {
            return;
        }

        match envelope.event {
            Event::Initialized(result) => {
                if self.status == SessionStatus::Initializing {
                    self.on_initialized(result);
                }
            }
            Event::ChunkSent { kind, index, sent } => self.on_chunk_sent(kind, index, sent),
            Event::ChunkFailed { kind, error } => self.on_chunk_failed(kind, error),
            Event::ChunkRetryDue { kind } => {
                if self.slots.slot(kind).status == SlotStatus::Uploading {
                    self.spawn_chunk(kind);
                }
            }
            Event::Committed(result) => self.on_committed(result),
            Event::CommitRetryDue => {
                if self.status == SessionStatus::Committing {
                    self.spawn_commit();
                }
            }
        }
    }

    fn on_initialized(&mut self, result: Result<String>) {
        let token = match result {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "could not initialize upload session");
                self.fail(UploadError::InitFailed {
                    last_error: err.to_string(),
                });
                return;
            }
        };

        debug!("upload session opened");
        self.token = Some(Arc::from(token));
        self.status = SessionStatus::Uploading;
        for kind in self.slots.selected_kinds() {
            self.slots.slot_mut(kind).status = SlotStatus::Uploading;
            self.spawn_chunk(kind);
        }
    }

    fn on_chunk_sent(&mut self, kind: AssetKind, index: u64, sent: u64) {
        let chunk_size = self.options.chunk_size;
        let slot = self.slots.slot_mut(kind);
        let Some(size) = slot.file.as_ref().map(|f| f.size) else {
            return;
        };
        slot.next_chunk = index + 1;
        slot.bytes_sent = sent;
        let done = slot.next_chunk >= ChunkPlan::new(size, chunk_size).total_chunks();

        if done {
            slot.status = SlotStatus::Succeeded;
            self.progress.complete(kind);
            info!(slot = %kind, bytes = size, "slot uploaded");
            self.maybe_commit();
        } else {
            self.progress.record(kind, sent, size);
            debug!(slot = %kind, sent, total = size, "chunk uploaded");
            self.spawn_chunk(kind);
        }
    }

    fn on_chunk_failed(&mut self, kind: AssetKind, err: UploadError) {
        if !err.is_retryable() {
            self.slots.slot_mut(kind).status = SlotStatus::Failed;
            self.fail(err);
            return;
        }

        let slot = self.slots.slot_mut(kind);
        slot.failures += 1;
        let failures = slot.failures;

        match self.options.chunk_retry.delay_after(failures) {
            Some(delay) => {
                warn!(slot = %kind, failures, ?delay, error = %err, "chunk failed, retrying");
                let epoch = self.epoch;
                self.spawn_after(delay, Envelope {
                    epoch,
                    event: Event::ChunkRetryDue { kind },
                });
            }
            None => {
                slot.status = SlotStatus::Failed;
                self.fail(UploadError::RetriesExhausted {
                    message: CHUNK_RETRIES_EXHAUSTED.to_string(),
                    last_error: err.to_string(),
                });
            }
        }
    }

    fn maybe_commit(&mut self) {
        if self.status == SessionStatus::Uploading && self.slots.all_selected_succeeded() {
            info!("all slots uploaded, committing");
            self.status = SessionStatus::Committing;
            self.spawn_commit();
        }
    }

    fn on_committed(&mut self, result: Result<CommitReceipt>) {
        match result {
            Ok(receipt) => {
                let name = self.task_name.take().unwrap_or_default();
                info!(task = %receipt.id, name = %name, "import committed");
                self.imported = Some(ImportedTask {
                    id: receipt.id,
                    name,
                });
                self.token = None;
                self.slots.clear();
                self.status = SessionStatus::Succeeded;
            }
            Err(err) if err.is_retryable() => {
                self.commit_failures += 1;
                match self.options.commit_retry.delay_after(self.commit_failures) {
                    Some(delay) => {
                        warn!(
                            failures = self.commit_failures,
                            ?delay,
                            error = %err,
                            "commit failed, retrying"
                        );
                        let epoch = self.epoch;
                        self.spawn_after(delay, Envelope {
                            epoch,
                            event: Event::CommitRetryDue,
                        });
                    }
                    None => self.fail(UploadError::RetriesExhausted {
                        message: COMMIT_RETRIES_EXHAUSTED.to_string(),
                        last_error: err.to_string(),
                    }),
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn spawn_chunk(&mut self, kind: AssetKind) {
        let slot = self.slots.slot(kind);
        let (Some(file), Some(token)) = (slot.file.clone(), self.token.clone()) else {
            return;
        };
        let plan = ChunkPlan::new(file.size, self.options.chunk_size);
        let index = slot.next_chunk;
        let api = Arc::clone(&self.api);

        self.spawn_reporting(async move {
            let result = async {
                let chunk: ChunkUpload = read_chunk(kind, &file, plan, index).await?;
                let sent = chunk.end_offset();
                api.upload_chunk(&token, chunk).await?;
                Ok::<_, UploadError>(sent)
            }
            .await;

            match result {
                Ok(sent) => Event::ChunkSent { kind, index, sent },
                Err(error) => Event::ChunkFailed { kind, error },
            }
        });
    }

    fn spawn_commit(&mut self) {
        let Some(token) = self.token.clone() else {
            return;
        };
        let name = self.task_name.clone().unwrap_or_else(default_task_name);
        let api = Arc::clone(&self.api);
        self.spawn_reporting(async move { Event::Committed(api.commit(&token, &name).await) });
    }

    fn spawn_after(&mut self, delay: Duration, envelope: Envelope) {
        let tx = self.events_tx.clone();
        self.track(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(envelope);
        }));
    }

    fn spawn_reporting<F>(&mut self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        let epoch = self.epoch;
        self.track(tokio::spawn(async move {
            let event = work.await;
            let _ = tx.send(Envelope { epoch, event });
        }));
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.in_flight.retain(|h| !h.is_finished());
        self.in_flight.push(handle);
    }
}

impl<A: ImportApi> Drop for UploadCoordinator<A> {
    fn drop(&mut self) {
        for handle in self.in_flight.drain(..) {
            handle.abort();
        }
    }
}

/// Name used when the caller does not pick one.
pub fn default_task_name() -> String {
    format!(
        "Task of {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
