//! Typed events carried by the backend's Server-Sent-Event streams.
//!
//! The backend names each frame with an `event:` line and puts the remaining
//! fields, without a `type` key, in the JSON `data:` payload. Parsing injects
//! the event name as the tag and lets serde pick the variant, so a frame whose
//! payload does not fit its variant is rejected as a whole.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw SSE frame as produced by the byte-stream decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Outcome the backend reports for a finished tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// One tool invocation announced by a `tool_call` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallItem {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
}

/// Events on the web-creator (site build and deploy) stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebCreatorEvent {
    Start {
        #[serde(rename = "taskId")]
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Delta {
        content: String,
    },
    ToolCall {
        tool_calls: Vec<ToolCallItem>,
    },
    ToolOutput {
        tool_call_id: String,
        status: ToolStatus,
    },
    Progress {
        stage: String,
        #[serde(default)]
        message: String,
    },
    Log {
        content: String,
    },
    DeployResult {
        preview_url: String,
        #[serde(default)]
        message: String,
    },
    Ping {
        timestamp: i64,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Events on the workflow (graph build) stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Start {
        #[serde(default)]
        data: Value,
    },
    Phase {
        phase: String,
        #[serde(default)]
        message: Option<String>,
    },
    Ping {
        timestamp: i64,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

/// Behaviour the stream runner needs from an event family.
pub trait StudioEvent: Sized + Send + 'static {
    /// Parse a raw frame, returning `None` for unknown or malformed frames.
    fn parse(frame: &SseFrame) -> Option<Self>;

    /// `done` and `error` end the stream.
    fn is_terminal(&self) -> bool;

    /// Keep-alive frames that only reset the idle timer.
    fn is_keepalive(&self) -> bool;

    /// Failure description carried by an `error` event.
    fn failure(&self) -> Option<String>;
}

impl WebCreatorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Delta { .. } => "delta",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolOutput { .. } => "tool_output",
            Self::Progress { .. } => "progress",
            Self::Log { .. } => "log",
            Self::DeployResult { .. } => "deploy_result",
            Self::Ping { .. } => "ping",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

impl StudioEvent for WebCreatorEvent {
    fn parse(frame: &SseFrame) -> Option<Self> {
        parse_web_creator_event(frame)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    fn is_keepalive(&self) -> bool {
        matches!(self, Self::Ping { .. })
    }

    fn failure(&self) -> Option<String> {
        match self {
            Self::Error { reason, message } => Some(
                reason
                    .clone()
                    .or_else(|| message.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            _ => None,
        }
    }
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Phase { .. } => "phase",
            Self::Ping { .. } => "ping",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

impl StudioEvent for WorkflowEvent {
    fn parse(frame: &SseFrame) -> Option<Self> {
        parse_workflow_event(frame)
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    fn is_keepalive(&self) -> bool {
        matches!(self, Self::Ping { .. })
    }

    fn failure(&self) -> Option<String> {
        match self {
            Self::Error {
                message, reason, ..
            } => Some(
                message
                    .clone()
                    .or_else(|| reason.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            _ => None,
        }
    }
}

const WEB_CREATOR_EVENTS: &[&str] = &[
    "start",
    "delta",
    "tool_call",
    "tool_output",
    "progress",
    "log",
    "deploy_result",
    "ping",
    "done",
    "error",
];

const WORKFLOW_EVENTS: &[&str] = &["start", "phase", "ping", "done", "error"];

/// Older backends spell some fields differently: `(event, alias, field)`.
/// The alias is folded into the field before deserializing, and dropped when
/// both are present.
const WEB_CREATOR_ALIASES: &[(&str, &str, &str)] = &[("start", "task_id", "taskId")];

/// Parse a web-creator frame. Unknown event names and payloads that do not
/// match the event's shape yield `None`.
pub fn parse_web_creator_event(frame: &SseFrame) -> Option<WebCreatorEvent> {
    parse_tagged(frame, WEB_CREATOR_EVENTS, WEB_CREATOR_ALIASES)
}

/// Parse a workflow-build frame. Unknown event names and payloads that do not
/// match the event's shape yield `None`.
pub fn parse_workflow_event(frame: &SseFrame) -> Option<WorkflowEvent> {
    parse_tagged(frame, WORKFLOW_EVENTS, &[])
}

fn parse_tagged<T: DeserializeOwned>(
    frame: &SseFrame,
    known: &[&str],
    aliases: &[(&str, &str, &str)],
) -> Option<T> {
    let name = frame.event.trim();
    if !known.contains(&name) {
        tracing::debug!(event = name, "skipping unknown stream event");
        return None;
    }

    let payload = if frame.data.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str::<Value>(&frame.data) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(event = name, error = %e, "skipping frame with invalid JSON");
                return None;
            }
        }
    };

    let Value::Object(mut map) = payload else {
        tracing::debug!(event = name, "skipping frame whose data is not an object");
        return None;
    };
    for &(event, alias, field) in aliases {
        if event != name {
            continue;
        }
        if let Some(value) = map.remove(alias) {
            map.entry(field).or_insert(value);
        }
    }
    map.insert("type".to_string(), Value::String(name.to_string()));

    match serde_json::from_value(Value::Object(map)) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(event = name, error = %e, "skipping frame with unexpected shape");
            None
        }
    }
}
