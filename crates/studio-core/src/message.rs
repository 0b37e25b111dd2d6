use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::stream::ToolStatus;

/// Who authored a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Which studio panel a chat entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMode {
    Workflow,
    WebCreator,
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workflow => write!(f, "workflow"),
            Self::WebCreator => write!(f, "webCreator"),
        }
    }
}

/// Display state of a chat entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Loading,
    Message,
    Progress,
}

/// File operation proposed by the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeOpKind {
    CodeWrite,
    CodeReplace,
    CodeDelete,
}

impl CodeOpKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CodeWrite => "code-write",
            Self::CodeReplace => "code-replace",
            Self::CodeDelete => "code-delete",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "code-write" => Some(Self::CodeWrite),
            "code-replace" => Some(Self::CodeReplace),
            "code-delete" => Some(Self::CodeDelete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOp {
    #[serde(rename = "type")]
    pub kind: CodeOpKind,
    pub path: String,
    #[serde(default)]
    pub content: String,
    /// Text being replaced, only present for `code-replace`.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub tool_use_id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
}

/// Deployed site announced by a `deploy_result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewLink {
    pub url: String,
    #[serde(default)]
    pub message: String,
}

/// One piece of content inside a chat entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageItem {
    Text {
        id: String,
        text: String,
    },
    Code {
        id: String,
        code: CodeOp,
    },
    Reasoning {
        id: String,
        reasoning: String,
    },
    Progress {
        id: String,
        #[serde(deserialize_with = "percent")]
        progress: u8,
    },
    ToolUse {
        id: String,
        #[serde(rename = "toolUse")]
        tool_use: ToolUse,
    },
    /// Build log line. Kept in the model, hidden when rendering.
    Log {
        id: String,
        log: String,
    },
    Preview {
        id: String,
        preview: PreviewLink,
    },
}

/// Stored transcripts may carry fractional or out-of-range percentages.
fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() {
        return Ok(0);
    }
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

impl MessageItem {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        MessageItem::Text {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MessageItem::Text { id, .. }
            | MessageItem::Code { id, .. }
            | MessageItem::Reasoning { id, .. }
            | MessageItem::Progress { id, .. }
            | MessageItem::ToolUse { id, .. }
            | MessageItem::Log { id, .. }
            | MessageItem::Preview { id, .. } => id,
        }
    }

    /// Whether the item is shown in a rendered transcript.
    pub fn is_visible(&self) -> bool {
        !matches!(self, MessageItem::Log { .. })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageItem::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUse> {
        match self {
            MessageItem::ToolUse { tool_use, .. } => Some(tool_use),
            _ => None,
        }
    }
}

/// One entry of a chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TurnKind>,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageItem>,
    pub mode: ChatMode,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Reason reported by the backend when the turn ended with an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatHistory {
    pub fn user(id: impl Into<String>, mode: ChatMode, content: Vec<MessageItem>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            role: Role::User,
            content,
            mode,
            parent_id: None,
            error: None,
        }
    }

    pub fn assistant_loading(id: impl Into<String>, mode: ChatMode) -> Self {
        Self {
            id: id.into(),
            kind: Some(TurnKind::Loading),
            role: Role::Assistant,
            content: Vec::new(),
            mode,
            parent_id: None,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.kind == Some(TurnKind::Loading)
    }

    /// Concatenation of every text item, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageItem::as_text)
            .collect()
    }

    pub fn visible_content(&self) -> impl Iterator<Item = &MessageItem> {
        self.content.iter().filter(|item| item.is_visible())
    }
}
