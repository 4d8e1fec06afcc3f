use crate::platform::{ConnectedAgentDetails, RemoteAgent, ToolDefinition};

/// A worker agent exposed as a tool of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedTool {
    pub agent_id: String,
    pub name: String,
    pub description: String,
}

impl ConnectedTool {
    /// `name` is the configured worker name, not the one the platform echoes
    pub fn new(agent: &RemoteAgent, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            agent_id: agent.id.clone(),
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition::ConnectedAgent {
            connected_agent: ConnectedAgentDetails {
                id: self.agent_id.clone(),
                name: self.name.clone(),
                description: self.description.clone(),
            },
        }]
    }
}
