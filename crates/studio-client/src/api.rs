//! Typed wrappers over the studio backend's HTTP endpoints.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use studio_chat::library::WorkflowBackend;
use studio_core::config::StudioConfig;
use studio_core::error::{Result, StreamError, StudioError};
use studio_core::message::ChatHistory;
use studio_core::workflow::{
    AgentToolDetail, AgentUpdate, ApiResponse, ModelInfo, Pagination, StreamTicket, TaskExecution,
    WorkflowDetail,
};

use crate::sse::{FrameStream, response_frames};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    graph_id: Option<&'a str>,
    messages: Vec<UserTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

impl<'a> StreamRequest<'a> {
    fn new(graph_id: Option<&'a str>, text: &'a str) -> Self {
        Self {
            graph_id,
            messages: vec![UserTurn {
                role: "user",
                content: vec![TextPart { text }],
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the studio backend.
#[derive(Debug, Clone)]
pub struct StudioClient {
    config: StudioConfig,
    client: reqwest::Client,
}

impl StudioClient {
    pub fn new(config: StudioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    // -- workflow builder -------------------------------------------------

    /// Submit a prompt that creates a new workflow.
    pub async fn create_workflow_stream(&self, text: &str) -> Result<StreamTicket> {
        self.post_json("/graphs/stream", &StreamRequest::new(None, text))
            .await
    }

    pub async fn workflow_stream(
        &self,
        execution_id: &str,
    ) -> Result<FrameStream> {
        self.open_stream(&format!("/graphs/stream/{execution_id}"), execution_id)
            .await
    }

    // -- web creator ------------------------------------------------------

    /// Submit a prompt that builds or refines the site of `workflow_id`.
    pub async fn create_web_creator_stream(
        &self,
        workflow_id: &str,
        text: &str,
    ) -> Result<StreamTicket> {
        self.post_json(
            "/web-builder/stream",
            &StreamRequest::new(Some(workflow_id), text),
        )
        .await
    }

    pub async fn web_creator_stream(
        &self,
        execution_id: &str,
    ) -> Result<FrameStream> {
        self.open_stream(&format!("/web-builder/stream/{execution_id}"), execution_id)
            .await
    }

    pub async fn web_creator_history(&self, workflow_id: &str) -> Result<Vec<ChatHistory>> {
        self.get_json(&format!("/web-builder/history/{workflow_id}"))
            .await
    }

    // -- lookups ----------------------------------------------------------

    pub async fn execution(&self, id: &str) -> Result<TaskExecution> {
        self.get_json(&format!("/executions/get_by_id/{id}")).await
    }

    pub async fn workflow(&self, id: &str) -> Result<WorkflowDetail> {
        self.get_json(&format!("/graphs/get_by_id/{id}")).await
    }

    /// One page of workflows, most recently updated first.
    pub async fn workflow_page(&self, page: u32, size: u32) -> Result<Pagination<WorkflowDetail>> {
        self.get_json(&format!(
            "/graphs/page?page={page}&size={size}&sort=updated_at:desc"
        ))
        .await
    }

    pub async fn tools(&self) -> Result<Vec<AgentToolDetail>> {
        self.get_json("/tools/all").await
    }

    pub async fn models(&self) -> Result<Vec<ModelInfo>> {
        self.get_json("/models/all").await
    }

    // -- edits ------------------------------------------------------------

    pub async fn delete(&self, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.config.endpoint(&format!("/graphs/delete_by_id/{id}")));
        self.send_unit(request).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        let request = self
            .client
            .put(self.config.endpoint(&format!("/graphs/update_by_id/{id}")))
            .json(&json!({ "name": name }));
        self.send_unit(request).await
    }

    /// Patch a single agent of the workflow's current spec.
    pub async fn update_agent(
        &self,
        workflow_id: &str,
        agent_name: &str,
        update: &AgentUpdate,
    ) -> Result<()> {
        let request = self
            .client
            .patch(self.config.endpoint(&format!("/graphs/{workflow_id}/spec")))
            .json(&agent_patch(agent_name, update)?);
        self.send_unit(request).await
    }

    // -- plumbing ---------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.config.endpoint(path));
        self.send_json(request).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.client.post(self.config.endpoint(path)).json(body);
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| StudioError::Http(e.to_string()))?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&body)?;
        envelope.into_data()
    }

    /// Send a request whose payload is not needed. An envelope, if present,
    /// is still checked for a failure code.
    async fn send_unit(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| StudioError::Http(e.to_string()))?;
        match serde_json::from_slice::<ApiResponse<Option<Value>>>(&body) {
            Ok(envelope) => envelope.into_data().map(|_| ()),
            Err(_) => Ok(()),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| StudioError::Http(e.to_string()))?;
        check_status(response).await
    }

    async fn open_stream(
        &self,
        path: &str,
        execution_id: &str,
    ) -> Result<FrameStream> {
        let url = self.config.endpoint(path);
        tracing::info!(%url, "opening event stream");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StudioError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StreamError::ExecutionNotFound(execution_id.to_string()).into());
        }
        let response = check_status(response).await?;
        Ok(Box::pin(response_frames(response)))
    }
}

/// Turn a non-2xx response into [`StudioError::Api`], using the body's
/// `message` or `detail` field when it has one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read response body".into());
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "detail"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(String::from))
        })
        .unwrap_or(body);
    tracing::warn!(status = status.as_u16(), %message, "backend request failed");
    Err(StudioError::Api {
        status: status.as_u16(),
        message,
    })
}

fn agent_patch(agent_name: &str, update: &AgentUpdate) -> Result<Value> {
    let mut agents = serde_json::Map::new();
    agents.insert(agent_name.to_string(), serde_json::to_value(update)?);
    Ok(json!({ "agents": { "update": agents } }))
}

#[async_trait]
impl WorkflowBackend for StudioClient {
    async fn list_workflows(&self, page: u32, size: u32) -> Result<Pagination<WorkflowDetail>> {
        self.workflow_page(page, size).await
    }

    async fn delete_workflow(&self, id: &str) -> Result<()> {
        self.delete(id).await
    }

    async fn rename_workflow(&self, id: &str, name: &str) -> Result<()> {
        self.rename(id, name).await
    }
}
