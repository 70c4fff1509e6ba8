mod state;

use crate::api::ImportApi;
use crate::config::ImportConfig;
use crate::error::{Result, UploadError};
use crate::upload::{
    AssetKind, CoordinatorOptions, ImportedTask, SelectedFile, SessionStatus, UploadCoordinator,
};
pub use state::{PanelState, SlotView};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The import panel: slot selection plus one upload session at a time.
pub struct ImportPanel<A: ImportApi> {
    coordinator: UploadCoordinator<A>,
    last_reported: Option<(SessionStatus, u32)>,
}

impl<A: ImportApi> ImportPanel<A> {
    pub fn new(api: Arc<A>, config: &ImportConfig) -> Self {
        Self {
            coordinator: UploadCoordinator::new(api, CoordinatorOptions::from(config)),
            last_reported: None,
        }
    }

    pub fn select_path(&mut self, kind: AssetKind, path: &Path) -> Result<()> {
        let file = SelectedFile::from_path(path)?;
        info!(slot = %kind, file = %file.name, bytes = file.size, "selected");
        if let Some(previous) = self.coordinator.select_file(kind, file)? {
            info!(slot = %kind, file = %previous.name, "replaced previous selection");
        }
        Ok(())
    }

    pub fn remove(&mut self, kind: AssetKind) -> Result<()> {
        self.coordinator.remove_file(kind).map(|_| ())
    }

    pub fn state(&self) -> PanelState {
        PanelState::capture(&self.coordinator)
    }

    pub fn coordinator(&self) -> &UploadCoordinator<A> {
        &self.coordinator
    }

    pub fn reset_upload_state(&mut self) {
        self.coordinator.cancel();
        self.last_reported = None;
    }

    /// Runs one session to completion, or until `cancel` resolves.
    pub async fn start_upload<F>(&mut self, name: Option<String>, cancel: F) -> Result<ImportedTask>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        self.last_reported = None;

        self.coordinator.start(name)?;
        self.report();

        loop {
            tokio::select! {
                active = self.coordinator.step() => {
                    self.report();
                    if !active {
                        break;
                    }
                }
                _ = &mut cancel => {
                    self.reset_upload_state();
                    info!("upload cancelled");
                    return Err(UploadError::Cancelled);
                }
            }
        }

        self.coordinator.outcome()
    }

    /// Logs the status line whenever the state or the whole percent changes.
    fn report(&mut self) {
        let state = self.state();
        let key = (state.status, state.percentage.floor() as u32);
        if self.last_reported != Some(key) {
            self.last_reported = Some(key);
            info!("{}", state.status_text());
        }
    }
}
