use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use studio_core::message::ChatMode;
use studio_core::stream::{StudioEvent, WebCreatorEvent, WorkflowEvent};

use crate::preview::{PreviewHistory, PreviewState};
use crate::reducer::ChatReducer;

/// Panel-level flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    /// A workflow build stream is in flight.
    pub workflow_creating: bool,
}

/// Everything a studio session holds in memory.
#[derive(Debug, Clone)]
pub struct StudioState {
    pub workflow_chat: ChatReducer,
    pub web_chat: ChatReducer,
    pub ui: UiState,
    pub preview: PreviewState,
    pub history: PreviewHistory,
    notices: VecDeque<String>,
}

/// Handle shared between the stream tasks and whoever renders the state.
pub type SharedState = Arc<RwLock<StudioState>>;

impl Default for StudioState {
    fn default() -> Self {
        Self {
            workflow_chat: ChatReducer::new(ChatMode::Workflow),
            web_chat: ChatReducer::new(ChatMode::WebCreator),
            ui: UiState::default(),
            preview: PreviewState::default(),
            history: PreviewHistory::default(),
            notices: VecDeque::new(),
        }
    }
}

impl StudioState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn chat(&self, mode: ChatMode) -> &ChatReducer {
        match mode {
            ChatMode::Workflow => &self.workflow_chat,
            ChatMode::WebCreator => &self.web_chat,
        }
    }

    pub fn chat_mut(&mut self, mode: ChatMode) -> &mut ChatReducer {
        match mode {
            ChatMode::Workflow => &mut self.workflow_chat,
            ChatMode::WebCreator => &mut self.web_chat,
        }
    }

    /// Fold a web-creator event into the chat and keep the preview pane in
    /// step with it.
    pub fn apply_web_event(&mut self, event: Option<&WebCreatorEvent>) -> bool {
        let changed = self.web_chat.apply(event);
        match event {
            Some(WebCreatorEvent::Start { .. }) => self.preview.pending = true,
            Some(WebCreatorEvent::DeployResult { preview_url, .. }) => {
                self.preview.deployed(preview_url.clone());
                self.history.reset();
            }
            Some(e) if e.is_terminal() => self.preview.pending = false,
            _ => {}
        }
        changed
    }

    pub fn apply_workflow_event(&mut self, event: Option<&WorkflowEvent>) -> bool {
        let changed = self.workflow_chat.apply_workflow(event);
        match event {
            Some(WorkflowEvent::Start { .. }) => self.ui.workflow_creating = true,
            Some(e) if e.is_terminal() => self.ui.workflow_creating = false,
            _ => {}
        }
        changed
    }

    /// Flag the panel for `mode` as waiting on a stream.
    pub fn set_streaming(&mut self, mode: ChatMode, streaming: bool) {
        match mode {
            ChatMode::Workflow => self.ui.workflow_creating = streaming,
            ChatMode::WebCreator => self.preview.pending = streaming,
        }
    }

    pub fn is_streaming(&self, mode: ChatMode) -> bool {
        match mode {
            ChatMode::Workflow => self.ui.workflow_creating,
            ChatMode::WebCreator => self.preview.pending,
        }
    }

    /// Queue a one-shot user notification.
    pub fn notify(&mut self, message: impl Into<String>) {
        self.notices.push_back(message.into());
    }

    /// Pop the oldest pending notification; each is delivered once.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notices.pop_front()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
