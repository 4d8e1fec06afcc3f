use std::sync::Arc;

use tracing::{error, info, warn};

use super::extractor::{extract_reply, Reply};
use super::factory::AgentFactory;
use super::runner::{PollPolicy, RunDriver, RunOutcome};
use crate::config::{AgentSpec, OrchestratorSpec};
use crate::error::CampaignError;
use crate::platform::{
    AgentDefinition, AgentPlatform, RemoteAgent, ResourceKind, RunError, RunStatus, Thread,
    ToolDefinition,
};
use crate::tools::{ConnectedTool, ExternalTool};

/// Remote resources a campaign created, in creation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedResources {
    pub agents: Vec<RemoteAgent>,
    pub threads: Vec<Thread>,
}

impl CreatedResources {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.threads.is_empty()
    }
}

/// Outcome of one campaign run
#[derive(Debug, Clone)]
pub struct CampaignResult {
    pub status: RunStatus,
    pub last_error: Option<RunError>,
    pub timed_out: bool,
    pub reply: Reply,
    pub resources: CreatedResources,
    pub warnings: Vec<String>,
}

impl CampaignResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Composes worker agents and the external tool under one orchestrating agent
/// and drives a single run over a fresh thread.
pub struct Orchestrator {
    platform: Arc<dyn AgentPlatform>,
    factory: AgentFactory,
    driver: RunDriver,
    model: String,
}

impl Orchestrator {
    pub fn new(platform: Arc<dyn AgentPlatform>, model: impl Into<String>, policy: PollPolicy) -> Self {
        let model = model.into();
        Self {
            factory: AgentFactory::new(platform.clone(), model.clone()),
            driver: RunDriver::new(platform.clone(), policy),
            platform,
            model,
        }
    }

    /// Run one campaign.
    ///
    /// Any failure before a reply can be read deletes every resource created
    /// so far before the error is returned. A failed run is reported in the
    /// result, not as an error.
    pub async fn run_campaign(
        &self,
        workers: &[AgentSpec],
        orchestrator: &OrchestratorSpec,
        external_tool: &ExternalTool,
        task: &str,
    ) -> Result<CampaignResult, CampaignError> {
        let mut resources = CreatedResources::default();
        let mut connected = Vec::with_capacity(workers.len());

        for worker in workers {
            match self.factory.create_worker_agent(worker).await {
                Ok((agent, tool)) => {
                    resources.agents.push(agent);
                    connected.push(tool);
                }
                Err(e) => return Err(self.abandon(&resources, e).await),
            }
        }

        let tools = assemble_tools(&connected, external_tool);
        let (thread_id, outcome) = match self
            .start(orchestrator, tools, task, &mut resources)
            .await
        {
            Ok(started) => started,
            Err(e) => return Err(self.abandon(&resources, e).await),
        };

        let mut warnings = Vec::new();
        if outcome.timed_out {
            warnings.push(format!(
                "stopped waiting for run {} in status {} after {} polls",
                outcome.run.id, outcome.run.status, outcome.polls
            ));
        }
        if let Some(last_error) = &outcome.run.last_error {
            warn!(run_id = %outcome.run.id, error = %last_error, "run reported an error");
        }

        let reply = match self.platform.list_messages(&thread_id).await {
            Ok(messages) => extract_reply(&messages),
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "could not read thread messages");
                warnings.push(format!("could not read messages of thread {}: {}", thread_id, e));
                Reply::default()
            }
        };

        let RunOutcome { run, timed_out, .. } = outcome;
        Ok(CampaignResult {
            status: run.status,
            last_error: run.last_error,
            timed_out,
            reply,
            resources,
            warnings,
        })
    }

    /// Create the orchestrating agent, the thread and the task message, then
    /// start the run and wait for it
    async fn start(
        &self,
        spec: &OrchestratorSpec,
        tools: Vec<ToolDefinition>,
        task: &str,
        resources: &mut CreatedResources,
    ) -> Result<(String, RunOutcome), CampaignError> {
        let tool_names: Vec<&str> = tools.iter().map(ToolDefinition::name).collect();
        info!(name = %spec.name, tools = ?tool_names, "creating orchestrator agent");

        let definition = AgentDefinition {
            model: self.model.clone(),
            name: spec.name.clone(),
            instructions: spec.instructions.clone(),
            description: None,
            tools,
        };
        let lead = self
            .platform
            .create_agent(&definition)
            .await
            .map_err(|e| CampaignError::create(ResourceKind::Agent, &spec.name, e))?;
        info!(agent_id = %lead.id, "created orchestrator agent");
        let lead_id = lead.id.clone();
        resources.agents.push(lead);

        let thread = self
            .platform
            .create_thread()
            .await
            .map_err(|e| CampaignError::create(ResourceKind::Thread, "campaign thread", e))?;
        info!(thread_id = %thread.id, "created thread");
        let thread_id = thread.id.clone();
        resources.threads.push(thread);

        let message_id = self
            .platform
            .create_message(&thread_id, task)
            .await
            .map_err(|e| CampaignError::create(ResourceKind::Message, "task", e))?;
        info!(message_id = %message_id, "posted task");

        let run = self
            .platform
            .create_run(&thread_id, &lead_id)
            .await
            .map_err(|e| CampaignError::create(ResourceKind::Run, &spec.name, e))?;
        info!(run_id = %run.id, status = %run.status, "started run");

        let outcome = self.driver.wait(&thread_id, run).await?;
        Ok((thread_id, outcome))
    }

    /// Roll back, attaching whatever could not be deleted to the error
    async fn abandon(&self, resources: &CreatedResources, err: CampaignError) -> CampaignError {
        let leftover = self.rollback(resources).await;
        if leftover.is_empty() {
            err
        } else {
            CampaignError::SetupFailed {
                source: Box::new(err),
                leftover,
            }
        }
    }

    /// Best-effort deletion of everything created so far, returning what is
    /// still on the platform
    async fn rollback(&self, resources: &CreatedResources) -> CreatedResources {
        let mut leftover = CreatedResources::default();
        if resources.is_empty() {
            return leftover;
        }
        warn!(
            agents = resources.agents.len(),
            threads = resources.threads.len(),
            "campaign setup failed; deleting created resources"
        );

        for thread in &resources.threads {
            if let Err(e) = self.platform.delete_thread(&thread.id).await {
                error!(thread_id = %thread.id, error = %e, "failed to delete thread during rollback");
                leftover.threads.push(thread.clone());
            }
        }
        for agent in resources.agents.iter().rev() {
            if let Err(e) = self.platform.delete_agent(&agent.id).await {
                error!(agent_id = %agent.id, error = %e, "failed to delete agent during rollback");
                leftover.agents.push(agent.clone());
            }
        }
        leftover
    }
}

/// Connected tools in worker order, then the external tool
pub fn assemble_tools(connected: &[ConnectedTool], external_tool: &ExternalTool) -> Vec<ToolDefinition> {
    connected
        .iter()
        .flat_map(ConnectedTool::definitions)
        .chain(external_tool.definitions())
        .collect()
}
