use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_CONNECTION_NAME: &str = "openai_images_connection";
pub const DEFAULT_CONNECTION_TARGET: &str = "https://api.openai.com/v1";

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("missing required environment variable: {0}")]
    Missing(String),
}

/// Platform settings resolved once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Project endpoint of the agents service
    pub endpoint: String,
    /// Model deployment every agent runs on
    pub model: String,
    pub api_version: String,
    /// Connection id used by the image generation tool
    pub connection_id: Option<String>,
    /// Pre-issued bearer token; falls back to the Azure CLI when absent
    pub token: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let endpoint = non_empty(&lookup, "PROJECT_ENDPOINT")
            .ok_or_else(|| SettingsError::Missing("PROJECT_ENDPOINT".into()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: non_empty(&lookup, "MODEL_DEPLOYMENT_NAME").unwrap_or_else(|| DEFAULT_MODEL.into()),
            api_version: non_empty(&lookup, "PROJECT_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.into()),
            connection_id: non_empty(&lookup, "IMAGE_CONNECTION_ID")
                .or_else(|| non_empty(&lookup, "REPLICATE_CONNECTION_ID")),
            token: non_empty(&lookup, "AZURE_AI_TOKEN"),
        })
    }
}

/// Inputs for provisioning the image API connection
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub subscription_id: String,
    pub resource_group: String,
    pub workspace: String,
    pub api_key: String,
    pub connection_name: String,
    pub target: String,
    pub token: Option<String>,
}

impl ProvisionSettings {
    pub fn from_env() -> Result<Self, Vec<SettingsError>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Collects every missing variable so they can be reported together
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Vec<SettingsError>> {
        let subscription_id = non_empty(&lookup, "AZURE_SUBSCRIPTION_ID");
        let resource_group = non_empty(&lookup, "AZURE_RESOURCE_GROUP");
        let workspace = non_empty(&lookup, "AZURE_AI_PROJECT_NAME")
            .or_else(|| non_empty(&lookup, "AZURE_WORKSPACE_NAME"));
        let api_key = non_empty(&lookup, "OPEN_API_KEY_FOR_IMAGES");

        match (subscription_id, resource_group, workspace, api_key) {
            (Some(subscription_id), Some(resource_group), Some(workspace), Some(api_key)) => {
                Ok(Self {
                    subscription_id,
                    resource_group,
                    workspace,
                    api_key,
                    connection_name: DEFAULT_CONNECTION_NAME.into(),
                    target: DEFAULT_CONNECTION_TARGET.into(),
                    token: non_empty(&lookup, "AZURE_MANAGEMENT_TOKEN"),
                })
            }
            (subscription_id, resource_group, workspace, api_key) => {
                let mut missing = Vec::new();
                if subscription_id.is_none() {
                    missing.push(SettingsError::Missing("AZURE_SUBSCRIPTION_ID".into()));
                }
                if resource_group.is_none() {
                    missing.push(SettingsError::Missing("AZURE_RESOURCE_GROUP".into()));
                }
                if workspace.is_none() {
                    missing.push(SettingsError::Missing(
                        "AZURE_AI_PROJECT_NAME (or AZURE_WORKSPACE_NAME)".into(),
                    ));
                }
                if api_key.is_none() {
                    missing.push(SettingsError::Missing("OPEN_API_KEY_FOR_IMAGES".into()));
                }
                Err(missing)
            }
        }
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}
