//! REST client for the hosted agents service.
//!
//! Every response shape the service produces is mapped into the types in
//! `platform::types` here, so nothing above this module looks at raw JSON.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use super::types::{
    AgentDefinition, Citation, MessageRole, RemoteAgent, Run, RunError, RunStatus, Thread,
    ThreadMessage,
};
use super::{AgentPlatform, PlatformError, TokenSource, AI_RESOURCE};
use crate::config::Settings;

const PAGE_SIZE: &str = "100";

/// Agents service reached over HTTPS
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    client: Client,
    endpoint: String,
    api_version: String,
    token: String,
}

impl HttpPlatform {
    pub fn new(
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            token: token.into(),
        }
    }

    /// Acquire a token once and build the client
    pub async fn connect(settings: &Settings, tokens: &dyn TokenSource) -> Result<Self, PlatformError> {
        let token = tokens.token(AI_RESOURCE).await?;
        Ok(Self::new(&settings.endpoint, &settings.api_version, token))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.endpoint, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("x-ms-client-request-id", Uuid::new_v4().to_string())
            .query(&[("api-version", self.api_version.as_str())])
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, PlatformError> {
        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "request to agents service failed");
            PlatformError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "agents service returned error status");
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    /// Follow `after` cursors until the service reports no more pages
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut builder = self
                .request(Method::GET, path)
                .query(&[("limit", PAGE_SIZE)])
                .query(params);
            if let Some(cursor) = &after {
                builder = builder.query(&[("after", cursor.as_str())]);
            }

            let page: WireList<T> = self.send(builder).await?;
            let fetched = page.data.len();
            items.extend(page.data);

            match page.last_id {
                Some(last_id) if page.has_more && fetched > 0 => after = Some(last_id),
                _ => break,
            }
        }

        debug!(path, count = items.len(), "listed resources");
        Ok(items)
    }

    async fn delete(&self, path: &str, id: &str) -> Result<(), PlatformError> {
        let deletion: WireDeletion = self.send(self.request(Method::DELETE, path)).await?;
        if deletion.deleted {
            Ok(())
        } else {
            Err(PlatformError::NotDeleted(id.to_string()))
        }
    }
}

#[async_trait]
impl AgentPlatform for HttpPlatform {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<RemoteAgent, PlatformError> {
        debug!(name = %definition.name, tools = definition.tools.len(), "creating agent");
        let agent: WireAgent = self
            .send(self.request(Method::POST, "assistants").json(definition))
            .await?;
        Ok(agent.into())
    }

    async fn list_agents(&self) -> Result<Vec<RemoteAgent>, PlatformError> {
        let agents: Vec<WireAgent> = self.list_all("assistants", &[]).await?;
        Ok(agents.into_iter().map(Into::into).collect())
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), PlatformError> {
        self.delete(&format!("assistants/{}", agent_id), agent_id).await
    }

    async fn create_thread(&self) -> Result<Thread, PlatformError> {
        let thread: WireThread = self
            .send(self.request(Method::POST, "threads").json(&json!({})))
            .await?;
        Ok(thread.into())
    }

    async fn list_threads(&self) -> Result<Vec<Thread>, PlatformError> {
        let threads: Vec<WireThread> = self.list_all("threads", &[]).await?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), PlatformError> {
        self.delete(&format!("threads/{}", thread_id), thread_id).await
    }

    async fn create_message(&self, thread_id: &str, content: &str) -> Result<String, PlatformError> {
        let message: WireId = self
            .send(
                self.request(Method::POST, &format!("threads/{}/messages", thread_id))
                    .json(&json!({ "role": "user", "content": content })),
            )
            .await?;
        Ok(message.id)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, PlatformError> {
        let messages: Vec<WireMessage> = self
            .list_all(&format!("threads/{}/messages", thread_id), &[("order", "desc")])
            .await?;
        Ok(messages.into_iter().map(Into::into).collect())
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<Run, PlatformError> {
        let run: WireRun = self
            .send(
                self.request(Method::POST, &format!("threads/{}/runs", thread_id))
                    .json(&json!({ "assistant_id": agent_id })),
            )
            .await?;
        Ok(run.into())
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, PlatformError> {
        let run: WireRun = self
            .send(self.request(Method::GET, &format!("threads/{}/runs/{}", thread_id, run_id)))
            .await?;
        Ok(run.into())
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Deserialize)]
struct WireList<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct WireId {
    id: String,
}

#[derive(Deserialize)]
struct WireDeletion {
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct WireAgent {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<WireAgent> for RemoteAgent {
    fn from(agent: WireAgent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct WireThread {
    id: String,
    #[serde(default)]
    created_at: Option<i64>,
}

impl From<WireThread> for Thread {
    fn from(thread: WireThread) -> Self {
        Self {
            id: thread.id,
            created_at: thread
                .created_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    role: String,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text { text: WireText },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
    #[serde(default)]
    annotations: Vec<WireAnnotation>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireAnnotation {
    UrlCitation { url_citation: WireUrlCitation },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireUrlCitation {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

impl From<WireMessage> for ThreadMessage {
    fn from(message: WireMessage) -> Self {
        let mut text = Vec::new();
        let mut citations = Vec::new();

        for content in message.content {
            if let WireContent::Text { text: segment } = content {
                for annotation in segment.annotations {
                    if let WireAnnotation::UrlCitation { url_citation } = annotation {
                        citations.push(Citation {
                            title: url_citation
                                .title
                                .unwrap_or_else(|| url_citation.url.clone()),
                            url: url_citation.url,
                        });
                    }
                }
                text.push(segment.value);
            }
        }

        Self {
            id: message.id,
            role: MessageRole::from(message.role),
            text,
            citations,
        }
    }
}

#[derive(Deserialize)]
struct WireRun {
    id: String,
    status: String,
    #[serde(default)]
    last_error: Option<WireRunError>,
}

#[derive(Deserialize)]
struct WireRunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<WireRun> for Run {
    fn from(run: WireRun) -> Self {
        Self {
            id: run.id,
            status: RunStatus::from(run.status),
            last_error: run.last_error.map(|e| RunError {
                code: e.code.unwrap_or_else(|| "unknown".into()),
                message: e.message.unwrap_or_default(),
            }),
        }
    }
}
