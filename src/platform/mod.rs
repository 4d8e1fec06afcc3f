mod auth;
#[cfg(test)]
pub mod fake;
mod http;
mod types;

pub use auth::{AzureCliToken, StaticToken, TokenSource, AI_RESOURCE, MANAGEMENT_RESOURCE};
pub use http::HttpPlatform;
pub use types::{
    AgentDefinition, Citation, ConnectedAgentDetails, ConnectionSecurityScheme, MessageRole,
    OpenApiAuth, OpenApiFunction, RemoteAgent, ResourceKind, Run, RunError, RunStatus, Thread, ThreadMessage,
    ToolDefinition,
};

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single call against the hosting platform
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("platform returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("platform did not delete {0}")]
    NotDeleted(String),
}

/// Operations the orchestration needs from an agent hosting platform
#[async_trait]
pub trait AgentPlatform: Send + Sync {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent, PlatformError>;

    async fn list_agents(&self) -> Result<Vec<RemoteAgent>, PlatformError>;

    async fn delete_agent(&self, agent_id: &str) -> Result<(), PlatformError>;

    async fn create_thread(&self) -> Result<Thread, PlatformError>;

    async fn list_threads(&self) -> Result<Vec<Thread>, PlatformError>;

    async fn delete_thread(&self, thread_id: &str) -> Result<(), PlatformError>;

    /// Post a user message, returning the message id
    async fn create_message(&self, thread_id: &str, content: &str) -> Result<String, PlatformError>;

    /// Messages newest first
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, PlatformError>;

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, PlatformError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, PlatformError>;
}
