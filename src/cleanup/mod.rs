mod confirm;
mod lifecycle;
mod manifest;

pub use confirm::{AssumeYes, Confirmer, StdinConfirmer};
pub use lifecycle::{CleanupSummary, DeletionReport, LifecycleManager, ManifestCleanup};
pub use manifest::{ManifestStore, DEFAULT_MANIFEST_FILE};
