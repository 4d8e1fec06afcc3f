mod loader;
mod settings;

pub use loader::{load_agent_specs, load_orchestrator_spec, AgentSpec, OrchestratorSpec};
pub use settings::{ProvisionSettings, Settings};
