//! Payloads exchanged with the studio backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StudioError};

/// Envelope every JSON endpoint wraps its payload in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i64,
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Unwrap the payload, treating any code other than 0 or 200 as a
    /// backend-reported failure.
    pub fn into_data(self) -> Result<T> {
        match self.code {
            0 | 200 => Ok(self.data),
            code => Err(StudioError::Api {
                status: u16::try_from(code).unwrap_or(500),
                message: self.message,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<T> {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from_node: String,
    pub to_node: String,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_node: from.into(),
            to_node: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDetail {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output_schema: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub agents: Vec<AgentDetail>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub entry_point: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub current_spec: WorkflowSpec,
    #[serde(default)]
    pub current_version_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolDetail {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    GraphBuilder,
    Webhook,
    WebBuilder,
    Deploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Pending,
    Running,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// A running execution can be reattached to by opening its stream.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ExecutionType,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub graph_id: String,
    #[serde(default)]
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Identifiers returned when a build or refine turn is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTicket {
    pub session_id: String,
    pub execution_id: String,
    pub graph_id: String,
}

/// Partial update for one agent of a workflow spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_response_success_codes() {
        let ok: ApiResponse<u32> = serde_json::from_value(json!({"message": "ok", "code": 200, "data": 7})).unwrap();
        assert_eq!(ok.into_data().unwrap(), 7);
        let zero: ApiResponse<u32> = serde_json::from_value(json!({"code": 0, "data": 1})).unwrap();
        assert_eq!(zero.into_data().unwrap(), 1);
    }

    #[test]
    fn api_response_failure_code() {
        let failed: ApiResponse<Option<u32>> =
            serde_json::from_value(json!({"message": "graph missing", "code": 404, "data": null}))
                .unwrap();
        match failed.into_data() {
            Err(StudioError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "graph missing");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn workflow_detail_from_backend() {
        let detail: WorkflowDetail = serde_json::from_value(json!({
            "id": "g1",
            "name": "Lead triage",
            "description": "",
            "current_spec": {
                "agents": [{"name": "classifier", "model": "m", "instruction": "i", "category": "general", "tools": []}],
                "nodes": ["classifier", "router"],
                "edges": [{"from_node": "classifier", "to_node": "router"}],
                "entry_point": "classifier",
                "input_schema": {},
                "output_schema": {}
            },
            "current_version_id": 3,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(detail.current_spec.agents.len(), 1);
        assert_eq!(detail.current_spec.edges[0], GraphEdge::new("classifier", "router"));
        assert_eq!(detail.current_version_id, 3);
    }

    #[test]
    fn pagination_camel_case() {
        let page: Pagination<String> = serde_json::from_value(json!({
            "page": 1, "limit": 100, "total": 2, "pages": 1,
            "hasNext": false, "hasPrev": false, "list": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(page.list, vec!["a", "b"]);
        assert!(!page.has_next);
    }

    #[test]
    fn task_execution_status() {
        let exec: TaskExecution = serde_json::from_value(json!({
            "id": "e1",
            "type": "web_builder",
            "status": "running",
            "error": null,
            "graph_id": "g1",
            "session_id": "s1",
            "created_at": "2025-01-01T00:00:00Z",
            "started_at": "2025-01-01T00:00:01Z",
            "completed_at": null,
            "updated_at": "2025-01-01T00:00:01Z"
        }))
        .unwrap();
        assert_eq!(exec.kind, ExecutionType::WebBuilder);
        assert!(exec.status.is_resumable());
        assert!(exec.completed_at.is_none());
    }

    #[test]
    fn agent_update_skips_unset_fields() {
        let update = AgentUpdate {
            model: Some("gpt-4o".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"model": "gpt-4o"}));
    }
}
