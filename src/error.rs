use thiserror::Error;

use crate::agent::CreatedResources;
use crate::platform::{PlatformError, ResourceKind};

/// Remote failures surfaced by campaign setup and cleanup
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("failed to create {kind} '{name}': {source}")]
    RemoteCreate {
        kind: ResourceKind,
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error("failed to delete {kind} {id}: {source}")]
    RemoteDelete {
        kind: ResourceKind,
        id: String,
        #[source]
        source: PlatformError,
    },

    #[error("failed to list {kind}s: {source}")]
    RemoteList {
        kind: ResourceKind,
        #[source]
        source: PlatformError,
    },

    #[error("failed to poll run {run_id}: {source}")]
    RunPoll {
        run_id: String,
        #[source]
        source: PlatformError,
    },

    #[error("{kind} resources cannot be deleted")]
    Undeletable { kind: ResourceKind },

    /// Setup failed and rollback left resources on the platform
    #[error("{source}; left on the platform: {}", resource_ids(.leftover))]
    SetupFailed {
        #[source]
        source: Box<CampaignError>,
        leftover: CreatedResources,
    },
}

fn resource_ids(resources: &CreatedResources) -> String {
    resources
        .agents
        .iter()
        .map(|a| a.id.as_str())
        .chain(resources.threads.iter().map(|t| t.id.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl CampaignError {
    pub fn create(kind: ResourceKind, name: impl Into<String>, source: PlatformError) -> Self {
        Self::RemoteCreate {
            kind,
            name: name.into(),
            source,
        }
    }

    /// Resources a failed setup could not delete
    pub fn leftover(&self) -> Option<&CreatedResources> {
        match self {
            Self::SetupFailed { leftover, .. } => Some(leftover),
            _ => None,
        }
    }
}
