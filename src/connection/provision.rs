//! Registers the image API key as a custom-keys connection on the AI project.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::ProvisionSettings;
use crate::platform::{TokenSource, MANAGEMENT_RESOURCE};

pub const MANAGEMENT_API_VERSION: &str = "2024-04-01";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("could not obtain a management token: {0}")]
    Auth(String),

    #[error("request to management API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("management API rejected the connection ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct ConnectionBody<'a> {
    properties: ConnectionProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionProperties<'a> {
    category: &'a str,
    auth_type: &'a str,
    credentials: Credentials,
    target: &'a str,
}

#[derive(Debug, Serialize)]
struct Credentials {
    keys: CredentialKeys,
}

#[derive(Debug, Serialize)]
struct CredentialKeys {
    #[serde(rename = "Authorization")]
    authorization: String,
}

impl<'a> ConnectionBody<'a> {
    fn new(settings: &'a ProvisionSettings) -> Self {
        Self {
            properties: ConnectionProperties {
                category: "CustomKeys",
                auth_type: "CustomKeys",
                credentials: Credentials {
                    keys: CredentialKeys {
                        authorization: format!("Bearer {}", settings.api_key),
                    },
                },
                target: &settings.target,
            },
        }
    }
}

fn connection_url(base_url: &str, settings: &ProvisionSettings) -> String {
    format!(
        "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}/connections/{}",
        base_url.trim_end_matches('/'),
        settings.subscription_id,
        settings.resource_group,
        settings.workspace,
        settings.connection_name,
    )
}

/// Create or replace the connection. Only 200 and 201 count as success.
pub async fn upsert_connection(
    client: &Client,
    base_url: &str,
    token: &str,
    settings: &ProvisionSettings,
) -> Result<(), ProvisionError> {
    let url = connection_url(base_url, settings);
    info!(connection = %settings.connection_name, workspace = %settings.workspace, "creating connection");

    let response = client
        .put(&url)
        .query(&[("api-version", MANAGEMENT_API_VERSION)])
        .bearer_auth(token)
        .json(&ConnectionBody::new(settings))
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::OK || status == StatusCode::CREATED {
        info!(connection = %settings.connection_name, "connection created");
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    error!(status = %status, "connection provisioning rejected");
    Err(ProvisionError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Acquire a management token and upsert against the public management endpoint
pub async fn provision(settings: &ProvisionSettings, tokens: &dyn TokenSource) -> Result<(), ProvisionError> {
    let token = match &settings.token {
        Some(token) => token.clone(),
        None => tokens
            .token(MANAGEMENT_RESOURCE)
            .await
            .map_err(|e| ProvisionError::Auth(e.to_string()))?,
    };
    upsert_connection(&Client::new(), MANAGEMENT_RESOURCE, &token, settings).await
}

/// Portal steps for creating the connection by hand
pub fn manual_instructions(settings: &ProvisionSettings) -> String {
    format!(
        "Create the connection manually:\n\
         1. Go to https://ai.azure.com\n\
         2. Open your project '{}'\n\
         3. Go to Settings > Connections\n\
         4. Click '+ New connection' and choose 'Custom keys'\n\
         5. Name: {}\n\
         6. Key: Authorization\n\
         7. Value: Bearer <your OpenAI API key>\n\
         8. Mark the value as secret and save",
        settings.workspace, settings.connection_name
    )
}
