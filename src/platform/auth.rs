use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::PlatformError;

/// Resource the agents data plane issues tokens for
pub const AI_RESOURCE: &str = "https://ai.azure.com";
/// Resource for the management API (connection provisioning)
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com";

/// Source of bearer tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, resource: &str) -> Result<String, PlatformError>;
}

/// Token handed in from the environment
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self, _resource: &str) -> Result<String, PlatformError> {
        Ok(self.0.clone())
    }
}

/// Token issued by the signed-in Azure CLI
pub struct AzureCliToken {
    program: String,
}

impl AzureCliToken {
    pub fn new() -> Self {
        Self { program: "az".into() }
    }
}

impl Default for AzureCliToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for AzureCliToken {
    async fn token(&self, resource: &str) -> Result<String, PlatformError> {
        debug!(resource, "requesting access token from Azure CLI");

        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--resource", resource])
            .args(["--query", "accessToken", "-o", "tsv"])
            .output()
            .await
            .map_err(|e| PlatformError::Auth(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(PlatformError::Auth(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(PlatformError::Auth("Azure CLI returned an empty token".into()));
        }
        Ok(token)
    }
}
