use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::confirm::Confirmer;
use super::manifest::SessionManifest;
use crate::agent::CreatedResources;
use crate::error::CampaignError;
use crate::platform::{AgentPlatform, PlatformError, RemoteAgent, ResourceKind, Thread};

/// Delay between deletions to stay under platform rate limits
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// A resource queued for deletion
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionTarget {
    pub id: String,
    /// Name or creation time shown next to the id
    pub label: Option<String>,
}

impl DeletionTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("{} ({})", self.id, label),
            None => self.id.clone(),
        }
    }
}

impl From<&RemoteAgent> for DeletionTarget {
    fn from(agent: &RemoteAgent) -> Self {
        Self {
            id: agent.id.clone(),
            label: Some(agent.name.clone()).filter(|n| !n.is_empty()),
        }
    }
}

impl From<&Thread> for DeletionTarget {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id.clone(),
            label: thread.created_at.map(|c| format!("created: {}", c.to_rfc3339())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionFailure {
    pub id: String,
    pub reason: String,
}

/// Result of one batch of deletions
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionReport {
    pub kind: ResourceKind,
    pub attempted: usize,
    pub deleted: usize,
    /// Resources still present remotely
    pub failed: Vec<DeletionFailure>,
    pub cancelled: bool,
}

impl DeletionReport {
    fn empty(kind: ResourceKind) -> Self {
        Self {
            kind,
            attempted: 0,
            deleted: 0,
            failed: Vec::new(),
            cancelled: false,
        }
    }

    fn cancelled(kind: ResourceKind) -> Self {
        Self {
            cancelled: true,
            ..Self::empty(kind)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupSummary {
    pub agents: DeletionReport,
    pub threads: DeletionReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifestCleanup {
    NothingToDo,
    Cancelled,
    Completed(CleanupSummary),
}

/// Enumerates and deletes remote agents and threads.
///
/// Every operation is fault tolerant: list failures yield empty results and a
/// failed deletion is recorded in the report without stopping the batch.
pub struct LifecycleManager {
    platform: Arc<dyn AgentPlatform>,
    confirmer: Arc<dyn Confirmer>,
    pacing: Duration,
}

impl LifecycleManager {
    pub fn new(platform: Arc<dyn AgentPlatform>, confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            platform,
            confirmer,
            pacing: DEFAULT_PACING,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn list_agents(&self) -> Vec<RemoteAgent> {
        match self.platform.list_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                let err = CampaignError::RemoteList {
                    kind: ResourceKind::Agent,
                    source: e,
                };
                error!(error = %err, "listing agents failed");
                Vec::new()
            }
        }
    }

    pub async fn list_threads(&self) -> Vec<Thread> {
        match self.platform.list_threads().await {
            Ok(threads) => threads,
            Err(e) => {
                let err = CampaignError::RemoteList {
                    kind: ResourceKind::Thread,
                    source: e,
                };
                error!(error = %err, "listing threads failed");
                Vec::new()
            }
        }
    }

    /// The failure is logged here; callers only decide how to count it
    pub async fn delete_agent(&self, target: &DeletionTarget) -> Result<(), CampaignError> {
        let result = self.platform.delete_agent(&target.id).await;
        Self::settle(ResourceKind::Agent, target, result)
    }

    pub async fn delete_thread(&self, target: &DeletionTarget) -> Result<(), CampaignError> {
        let result = self.platform.delete_thread(&target.id).await;
        Self::settle(ResourceKind::Thread, target, result)
    }

    async fn try_delete(&self, kind: ResourceKind, target: &DeletionTarget) -> Result<(), CampaignError> {
        match kind {
            ResourceKind::Agent => self.delete_agent(target).await,
            ResourceKind::Thread => self.delete_thread(target).await,
            ResourceKind::Message | ResourceKind::Run => {
                let err = CampaignError::Undeletable { kind };
                warn!(id = %target.id, error = %err, "deletion refused");
                Err(err)
            }
        }
    }

    fn settle(
        kind: ResourceKind,
        target: &DeletionTarget,
        result: Result<(), PlatformError>,
    ) -> Result<(), CampaignError> {
        match result {
            Ok(()) => {
                info!(kind = %kind, target = %target.describe(), "deleted");
                Ok(())
            }
            Err(e) => {
                let err = CampaignError::RemoteDelete {
                    kind,
                    id: target.id.clone(),
                    source: e,
                };
                warn!(error = %err, "deletion failed");
                Err(err)
            }
        }
    }

    /// Ask on a blocking thread so the prompt does not stall a runtime worker
    async fn confirm(&self, question: String, items: Vec<String>) -> bool {
        let confirmer = self.confirmer.clone();
        tokio::task::spawn_blocking(move || confirmer.confirm(&question, &items))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "confirmation prompt failed");
                false
            })
    }

    /// Delete targets one by one, pacing the calls
    pub async fn bulk_delete(
        &self,
        targets: &[DeletionTarget],
        kind: ResourceKind,
        require_confirmation: bool,
    ) -> DeletionReport {
        if targets.is_empty() {
            info!(kind = %kind, "nothing to delete");
            return DeletionReport::empty(kind);
        }

        if require_confirmation {
            let items: Vec<String> = targets.iter().map(DeletionTarget::describe).collect();
            let question = format!("Are you sure you want to delete these {} {}(s)?", targets.len(), kind);
            if !self.confirm(question, items).await {
                info!(kind = %kind, "deletion cancelled");
                return DeletionReport::cancelled(kind);
            }
        }

        let mut report = DeletionReport::empty(kind);
        for (index, target) in targets.iter().enumerate() {
            report.attempted += 1;
            match self.try_delete(kind, target).await {
                Ok(()) => report.deleted += 1,
                Err(e) => report.failed.push(DeletionFailure {
                    id: target.id.clone(),
                    reason: e.to_string(),
                }),
            }
            if index + 1 < targets.len() && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(
            kind = %kind,
            deleted = report.deleted,
            attempted = report.attempted,
            "deletion batch finished"
        );
        report
    }

    pub async fn cleanup_all_agents(&self, require_confirmation: bool) -> DeletionReport {
        let targets: Vec<DeletionTarget> = self.list_agents().await.iter().map(Into::into).collect();
        self.bulk_delete(&targets, ResourceKind::Agent, require_confirmation)
            .await
    }

    pub async fn cleanup_all_threads(&self, require_confirmation: bool) -> DeletionReport {
        let targets: Vec<DeletionTarget> = self.list_threads().await.iter().map(Into::into).collect();
        self.bulk_delete(&targets, ResourceKind::Thread, require_confirmation)
            .await
    }

    pub async fn cleanup_specific_threads(
        &self,
        thread_ids: &[String],
        require_confirmation: bool,
    ) -> DeletionReport {
        let targets: Vec<DeletionTarget> = thread_ids.iter().map(DeletionTarget::new).collect();
        self.bulk_delete(&targets, ResourceKind::Thread, require_confirmation)
            .await
    }

    /// Every agent, then every thread
    pub async fn full_cleanup(&self, require_confirmation: bool) -> CleanupSummary {
        let agents = self.cleanup_all_agents(require_confirmation).await;
        let threads = self.cleanup_all_threads(require_confirmation).await;
        CleanupSummary { agents, threads }
    }

    /// Delete exactly what a manifest lists, after a single confirmation
    pub async fn cleanup_from_manifest(
        &self,
        manifest: Option<&SessionManifest>,
        require_confirmation: bool,
    ) -> ManifestCleanup {
        let Some(manifest) = manifest.filter(|m| !m.is_empty()) else {
            info!("no session resources to clean up");
            return ManifestCleanup::NothingToDo;
        };

        let agents: Vec<DeletionTarget> = manifest
            .agents
            .iter()
            .map(|a| DeletionTarget {
                id: a.id.clone(),
                label: a.name.clone(),
            })
            .collect();
        let threads: Vec<DeletionTarget> = manifest
            .threads
            .iter()
            .map(|t| DeletionTarget {
                id: t.id.clone(),
                label: t.created_at.as_ref().map(|c| format!("created: {}", c)),
            })
            .collect();

        if require_confirmation {
            let items = vec![
                format!("{} agent(s)", agents.len()),
                format!("{} thread(s)", threads.len()),
            ];
            let question = format!(
                "Delete all resources from the session recorded at {}?",
                manifest.timestamp.as_deref().unwrap_or("unknown time")
            );
            if !self.confirm(question, items).await {
                info!("session cleanup cancelled");
                return ManifestCleanup::Cancelled;
            }
        }

        ManifestCleanup::Completed(CleanupSummary {
            agents: self.bulk_delete(&agents, ResourceKind::Agent, false).await,
            threads: self.bulk_delete(&threads, ResourceKind::Thread, false).await,
        })
    }

    /// Immediate teardown of a campaign's own resources, without confirmation
    pub async fn delete_resources(&self, resources: &CreatedResources) -> CleanupSummary {
        let agents: Vec<DeletionTarget> = resources.agents.iter().map(Into::into).collect();
        let threads: Vec<DeletionTarget> = resources.threads.iter().map(Into::into).collect();
        CleanupSummary {
            agents: self.bulk_delete(&agents, ResourceKind::Agent, false).await,
            threads: self.bulk_delete(&threads, ResourceKind::Thread, false).await,
        }
    }
}
