mod chunker;
mod coordinator;
mod progress;
mod retry;
mod slots;
mod types;

pub use chunker::{read_chunk, ChunkPlan};
pub use coordinator::{default_task_name, CoordinatorOptions, UploadCoordinator};
pub use progress::{FileProgress, ProgressAggregator};
pub use retry::RetryPolicy;
pub use slots::{Slot, SlotManager};
pub use types::{AssetKind, ImportedTask, SelectedFile, SessionStatus, SlotStatus};
