use crate::api::ImportApi;
use crate::upload::{AssetKind, ImportedTask, SessionStatus, SlotStatus, UploadCoordinator};
use crate::utils::file_size::ByteSize;

#[derive(Debug, Clone, PartialEq)]
pub struct SlotView {
    pub kind: AssetKind,
    pub file_name: Option<String>,
    pub status: SlotStatus,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

/// Point-in-time view of the coordinator, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub status: SessionStatus,
    pub percentage: f64,
    pub bytes_sent: u64,
    pub bytes_total: u64,
    pub slots: Vec<SlotView>,
    pub error_message: Option<String>,
    pub task: Option<ImportedTask>,
}

impl PanelState {
    pub fn capture<A: ImportApi>(coordinator: &UploadCoordinator<A>) -> Self {
        let progress = coordinator.progress();
        let slots = coordinator
            .slots()
            .slots()
            .map(|slot| {
                let file = progress.file(slot.kind).unwrap_or_default();
                SlotView {
                    kind: slot.kind,
                    file_name: slot.file.as_ref().map(|f| f.name.clone()),
                    status: slot.status,
                    bytes_sent: file.sent,
                    bytes_total: file.total,
                }
            })
            .collect();

        let percentage = match coordinator.status() {
            SessionStatus::Succeeded => 100.0,
            _ => progress.percentage(),
        };

        Self {
            status: coordinator.status(),
            percentage,
            bytes_sent: progress.bytes_sent(),
            bytes_total: progress.bytes_total(),
            slots,
            error_message: coordinator.error().map(|e| e.user_message()),
            task: coordinator.imported_task().cloned(),
        }
    }

    pub fn selected_count(&self) -> usize {
        self.slots.iter().filter(|s| s.file_name.is_some()).count()
    }

    pub fn finished_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.status == SlotStatus::Succeeded)
            .count()
    }

    pub fn status_text(&self) -> String {
        match self.status {
            SessionStatus::Idle => format!("Ready | {} file(s) selected", self.selected_count()),
            SessionStatus::Initializing => "Initializing upload...".to_string(),
            SessionStatus::Uploading => format!(
                "Uploading: {:.1}% ({} / {}) | {}/{} files done",
                self.percentage,
                ByteSize(self.bytes_sent),
                ByteSize(self.bytes_total),
                self.finished_count(),
                self.selected_count()
            ),
            SessionStatus::Committing => "Finalizing import...".to_string(),
            SessionStatus::Succeeded => match &self.task {
                Some(task) => format!("Imported as task {} ({})", task.id, task.name),
                None => "Import complete".to_string(),
            },
            SessionStatus::Failed => format!(
                "Failed: {}",
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
