use std::sync::Arc;

use tracing::{error, info};

use crate::config::AgentSpec;
use crate::error::CampaignError;
use crate::platform::{AgentDefinition, AgentPlatform, RemoteAgent, ResourceKind};
use crate::tools::ConnectedTool;

/// Creates worker agents and wraps them as connected tools
pub struct AgentFactory {
    platform: Arc<dyn AgentPlatform>,
    model: String,
}

impl AgentFactory {
    pub fn new(platform: Arc<dyn AgentPlatform>, model: impl Into<String>) -> Self {
        Self {
            platform,
            model: model.into(),
        }
    }

    /// One remote create call, no tools, no retry
    pub async fn create_worker_agent(
        &self,
        spec: &AgentSpec,
    ) -> Result<(RemoteAgent, ConnectedTool), CampaignError> {
        let definition = AgentDefinition {
            model: self.model.clone(),
            name: spec.name.clone(),
            instructions: spec.instructions.clone(),
            description: Some(spec.description.clone()),
            tools: Vec::new(),
        };

        let agent = self
            .platform
            .create_agent(&definition)
            .await
            .map_err(|e| {
                error!(name = %spec.name, error = %e, "worker agent creation failed");
                CampaignError::create(ResourceKind::Agent, &spec.name, e)
            })?;

        info!(agent_id = %agent.id, name = %agent.name, "created worker agent");
        let tool = ConnectedTool::new(&agent, &spec.name, &spec.description);
        Ok((agent, tool))
    }
}
