pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod workflow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::StudioConfig;
    pub use crate::error::{Result, StudioError};
    pub use crate::message::{ChatHistory, ChatMode, MessageItem, Role, TurnKind};
    pub use crate::stream::{
        SseFrame, WebCreatorEvent, WorkflowEvent, parse_web_creator_event, parse_workflow_event,
    };
    pub use crate::workflow::{GraphEdge, WorkflowDetail, WorkflowSpec};
}
