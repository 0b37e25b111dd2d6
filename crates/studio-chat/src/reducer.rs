//! Folds stream events into a chat transcript.
//!
//! The reducer is a pure fold: ids come from an internal counter, so replaying
//! the same event log against a fresh reducer yields an identical transcript.

use studio_core::message::{
    ChatHistory, ChatMode, MessageItem, PreviewLink, Role, ToolUse, TurnKind,
};
use studio_core::stream::{StudioEvent, ToolCallItem, WebCreatorEvent, WorkflowEvent};

/// Percentage shown for a deploy stage, `None` for stages we do not know.
pub fn stage_progress(stage: &str) -> Option<u8> {
    match stage {
        "checking" => Some(10),
        "installing" => Some(40),
        "building" => Some(70),
        "deploying" => Some(90),
        "completed" | "done" | "deployed" => Some(100),
        _ => None,
    }
}

/// Transcript of one studio panel plus the turn currently being streamed.
#[derive(Debug, Clone)]
pub struct ChatReducer {
    mode: ChatMode,
    transcript: Vec<ChatHistory>,
    active: Option<String>,
    next_id: u64,
}

impl ChatReducer {
    pub fn new(mode: ChatMode) -> Self {
        Self {
            mode,
            transcript: Vec::new(),
            active: None,
            next_id: 0,
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn transcript(&self) -> &[ChatHistory] {
        &self.transcript
    }

    /// Id of the assistant turn events are currently applied to.
    pub fn active_turn(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Replace the transcript with entries loaded from the backend history.
    pub fn load_history(&mut self, entries: Vec<ChatHistory>) {
        self.transcript = entries;
        self.active = None;
    }

    /// Append a user message and return its id.
    pub fn push_user_message(&mut self, text: impl Into<String>) -> String {
        let id = self.next_id();
        let item_id = self.next_id();
        self.transcript.push(ChatHistory::user(
            id.clone(),
            self.mode,
            vec![MessageItem::text(item_id, text)],
        ));
        id
    }

    /// Append an empty loading assistant entry ahead of the stream opening.
    /// A following `start` adopts it instead of opening a second turn.
    pub fn push_loading_placeholder(&mut self) -> String {
        let id = self.next_id();
        self.transcript
            .push(ChatHistory::assistant_loading(id.clone(), self.mode));
        id
    }

    /// Stop applying events to the active turn without touching its content.
    /// Used when the connection is aborted or lost mid-turn.
    pub fn detach(&mut self) -> Option<String> {
        self.active.take()
    }

    /// Apply one web-creator event. `None` (a frame the parser rejected)
    /// leaves the state unchanged. Returns whether the transcript changed.
    pub fn apply(&mut self, event: Option<&WebCreatorEvent>) -> bool {
        let Some(event) = event else {
            return false;
        };

        match event {
            WebCreatorEvent::Start { .. } => {
                self.open_turn();
                true
            }
            WebCreatorEvent::Ping { .. } => false,
            WebCreatorEvent::Delta { content } => self.with_turn(event.name(), |r, idx| {
                r.append_text(idx, content);
            }),
            WebCreatorEvent::ToolCall { tool_calls } => self.with_turn(event.name(), |r, idx| {
                for call in tool_calls {
                    r.record_tool_call(idx, call);
                }
            }),
            WebCreatorEvent::ToolOutput {
                tool_call_id,
                status,
            } => self.with_turn(event.name(), |r, idx| {
                let found = r.transcript[idx].content.iter_mut().find_map(|item| match item {
                    MessageItem::ToolUse { tool_use, .. } if tool_use.tool_use_id == *tool_call_id => {
                        Some(tool_use)
                    }
                    _ => None,
                });
                match found {
                    Some(tool_use) => tool_use.status = Some(*status),
                    None => tracing::warn!(%tool_call_id, "tool output for unknown tool call"),
                }
            }),
            WebCreatorEvent::Progress { stage, .. } => self.with_turn(event.name(), |r, idx| {
                r.set_progress(idx, stage_progress(stage));
            }),
            WebCreatorEvent::Log { content } => self.with_turn(event.name(), |r, idx| {
                let id = r.next_id();
                r.transcript[idx].content.push(MessageItem::Log {
                    id,
                    log: content.clone(),
                });
            }),
            WebCreatorEvent::DeployResult {
                preview_url,
                message,
            } => self.with_turn(event.name(), |r, idx| {
                let id = r.next_id();
                r.transcript[idx].content.push(MessageItem::Preview {
                    id,
                    preview: PreviewLink {
                        url: preview_url.clone(),
                        message: message.clone(),
                    },
                });
            }),
            WebCreatorEvent::Done { .. } | WebCreatorEvent::Error { .. } => {
                let failure = event.failure();
                self.close_turn(event.name(), failure)
            }
        }
    }

    /// Apply one workflow-build event. `None` leaves the state unchanged.
    pub fn apply_workflow(&mut self, event: Option<&WorkflowEvent>) -> bool {
        let Some(event) = event else {
            return false;
        };

        match event {
            WorkflowEvent::Start { .. } => {
                self.open_turn();
                true
            }
            WorkflowEvent::Ping { .. } => false,
            WorkflowEvent::Phase { phase, message } => {
                let label = match message.as_deref() {
                    Some(m) if !m.is_empty() => format!("{phase}: {m}"),
                    _ => phase.clone(),
                };
                self.with_turn(event.name(), move |r, idx| {
                    r.transcript[idx].kind = Some(TurnKind::Progress);
                    match r.transcript[idx].content.last_mut() {
                        Some(MessageItem::Reasoning { reasoning, .. }) => *reasoning = label,
                        _ => {
                            let id = r.next_id();
                            r.transcript[idx].content.push(MessageItem::Reasoning {
                                id,
                                reasoning: label,
                            });
                        }
                    }
                })
            }
            WorkflowEvent::Done { .. } | WorkflowEvent::Error { .. } => {
                let failure = event.failure();
                self.close_turn(event.name(), failure)
            }
        }
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        let prefix = match self.mode {
            ChatMode::Workflow => "wf",
            ChatMode::WebCreator => "wc",
        };
        format!("{prefix}-{}", self.next_id)
    }

    fn active_index(&self) -> Option<usize> {
        let active = self.active.as_deref()?;
        self.transcript.iter().rposition(|entry| entry.id == active)
    }

    fn open_turn(&mut self) {
        if let Some(idx) = self.active_index() {
            tracing::warn!(turn = %self.transcript[idx].id, "new turn started before the previous one closed");
            self.transcript[idx].kind = Some(TurnKind::Message);
        }

        let placeholder = self.transcript.last().filter(|entry| {
            entry.role == Role::Assistant && entry.is_loading() && entry.content.is_empty()
        });
        let id = match placeholder {
            Some(entry) if self.active.as_deref() != Some(entry.id.as_str()) => entry.id.clone(),
            _ => {
                let id = self.next_id();
                self.transcript
                    .push(ChatHistory::assistant_loading(id.clone(), self.mode));
                id
            }
        };
        self.active = Some(id);
    }

    fn with_turn(&mut self, event: &str, f: impl FnOnce(&mut Self, usize)) -> bool {
        match self.active_index() {
            Some(idx) => {
                f(self, idx);
                true
            }
            None => {
                tracing::debug!(event, "ignoring event outside an active turn");
                false
            }
        }
    }

    fn close_turn(&mut self, name: &str, failure: Option<String>) -> bool {
        let Some(idx) = self.active_index() else {
            tracing::debug!(event = name, "terminal event without an active turn");
            self.active = None;
            return false;
        };
        let turn = &mut self.transcript[idx];
        turn.kind = Some(TurnKind::Message);
        if let Some(reason) = failure {
            tracing::warn!(turn = %turn.id, %reason, "turn ended with an error");
            turn.error = Some(reason);
        }
        self.active = None;
        true
    }

    fn append_text(&mut self, idx: usize, delta: &str) {
        if let Some(MessageItem::Text { text, .. }) = self.transcript[idx].content.last_mut() {
            text.push_str(delta);
            return;
        }
        let id = self.next_id();
        self.transcript[idx]
            .content
            .push(MessageItem::text(id, delta));
    }

    fn record_tool_call(&mut self, idx: usize, call: &ToolCallItem) {
        let existing = self.transcript[idx].content.iter_mut().find_map(|item| match item {
            MessageItem::ToolUse { tool_use, .. } if tool_use.tool_use_id == call.tool_call_id => {
                Some(tool_use)
            }
            _ => None,
        });
        if let Some(tool_use) = existing {
            tool_use.name = call.tool_name.clone();
            tool_use.input = call.args.clone();
            return;
        }

        let id = self.next_id();
        self.transcript[idx].content.push(MessageItem::ToolUse {
            id,
            tool_use: ToolUse {
                tool_use_id: call.tool_call_id.clone(),
                name: call.tool_name.clone(),
                input: call.args.clone(),
                status: None,
            },
        });
    }

    fn set_progress(&mut self, idx: usize, percent: Option<u8>) {
        if let Some(MessageItem::Progress { progress, .. }) = self.transcript[idx].content.last_mut() {
            if let Some(p) = percent {
                *progress = p;
            }
            return;
        }
        let id = self.next_id();
        self.transcript[idx].content.push(MessageItem::Progress {
            id,
            progress: percent.unwrap_or(0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use studio_core::stream::ToolStatus;

    fn start() -> WebCreatorEvent {
        WebCreatorEvent::Start {
            task_id: "t1".into(),
            data: None,
        }
    }

    fn delta(s: &str) -> WebCreatorEvent {
        WebCreatorEvent::Delta { content: s.into() }
    }

    fn done() -> WebCreatorEvent {
        WebCreatorEvent::Done { data: None }
    }

    fn tool_call(id: &str, name: &str) -> WebCreatorEvent {
        WebCreatorEvent::ToolCall {
            tool_calls: vec![ToolCallItem {
                tool_call_id: id.into(),
                tool_name: name.into(),
                args: json!({"path": "index.html"}),
            }],
        }
    }

    fn fold(events: &[WebCreatorEvent]) -> ChatReducer {
        let mut r = ChatReducer::new(ChatMode::WebCreator);
        for e in events {
            r.apply(Some(e));
        }
        r
    }

    #[test]
    fn start_opens_loading_turn() {
        let r = fold(&[start()]);
        assert_eq!(r.transcript().len(), 1);
        let turn = &r.transcript()[0];
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.is_loading());
        assert!(turn.content.is_empty());
        assert_eq!(r.active_turn(), Some(turn.id.as_str()));
    }

    #[test]
    fn deltas_accumulate_into_one_text_item() {
        let r = fold(&[start(), delta("a"), delta("b"), done()]);
        assert_eq!(r.transcript().len(), 1);
        let turn = &r.transcript()[0];
        assert_eq!(turn.content.len(), 1);
        assert_eq!(turn.content[0].as_text(), Some("ab"));
        assert_eq!(turn.kind, Some(TurnKind::Message));
        assert!(!r.is_streaming());
    }

    #[test]
    fn delta_after_tool_call_starts_new_text_item() {
        let r = fold(&[start(), delta("Reading"), tool_call("c1", "file_read"), delta("Done")]);
        let content = &r.transcript()[0].content;
        assert_eq!(content.len(), 3);
        assert_eq!(content[0].as_text(), Some("Reading"));
        assert!(content[1].as_tool_use().is_some());
        assert_eq!(content[2].as_text(), Some("Done"));
    }

    #[test]
    fn tool_output_marks_status_in_any_order() {
        let r = fold(&[
            start(),
            WebCreatorEvent::ToolCall {
                tool_calls: vec![
                    ToolCallItem {
                        tool_call_id: "c1".into(),
                        tool_name: "file_write".into(),
                        args: json!({}),
                    },
                    ToolCallItem {
                        tool_call_id: "c2".into(),
                        tool_name: "shell".into(),
                        args: json!({}),
                    },
                ],
            },
            WebCreatorEvent::ToolOutput {
                tool_call_id: "c2".into(),
                status: ToolStatus::Error,
            },
            WebCreatorEvent::ToolOutput {
                tool_call_id: "c1".into(),
                status: ToolStatus::Success,
            },
        ]);
        let uses: Vec<_> = r.transcript()[0]
            .content
            .iter()
            .filter_map(MessageItem::as_tool_use)
            .collect();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].status, Some(ToolStatus::Success));
        assert_eq!(uses[1].status, Some(ToolStatus::Error));
    }

    #[test]
    fn repeated_tool_call_id_is_not_duplicated() {
        let r = fold(&[start(), tool_call("c1", "editor"), tool_call("c1", "editor")]);
        let count = r.transcript()[0]
            .content
            .iter()
            .filter(|i| i.as_tool_use().is_some())
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn tool_output_for_unknown_id_keeps_items() {
        let mut r = fold(&[start(), tool_call("c1", "shell")]);
        r.apply(Some(&WebCreatorEvent::ToolOutput {
            tool_call_id: "zzz".into(),
            status: ToolStatus::Success,
        }));
        let content = &r.transcript()[0].content;
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].as_tool_use().unwrap().status, None);
    }

    #[test]
    fn progress_updates_trailing_item() {
        let r = fold(&[
            start(),
            WebCreatorEvent::Progress {
                stage: "installing".into(),
                message: "npm install".into(),
            },
            WebCreatorEvent::Progress {
                stage: "building".into(),
                message: "build".into(),
            },
        ]);
        let content = &r.transcript()[0].content;
        assert_eq!(content.len(), 1);
        assert!(matches!(content[0], MessageItem::Progress { progress: 70, .. }));
    }

    #[test]
    fn progress_complete_does_not_close_turn() {
        let r = fold(&[
            start(),
            WebCreatorEvent::Progress {
                stage: "completed".into(),
                message: String::new(),
            },
        ]);
        assert!(r.is_streaming());
        assert!(r.transcript()[0].is_loading());
        assert!(matches!(
            r.transcript()[0].content[0],
            MessageItem::Progress { progress: 100, .. }
        ));
    }

    #[test]
    fn unknown_stage_keeps_previous_percentage() {
        let r = fold(&[
            start(),
            WebCreatorEvent::Progress {
                stage: "checking".into(),
                message: String::new(),
            },
            WebCreatorEvent::Progress {
                stage: "mounting".into(),
                message: String::new(),
            },
        ]);
        assert!(matches!(
            r.transcript()[0].content[0],
            MessageItem::Progress { progress: 10, .. }
        ));
    }

    #[test]
    fn logs_are_retained_but_hidden() {
        let r = fold(&[
            start(),
            WebCreatorEvent::Log {
                content: "[npm install] added 12 packages".into(),
            },
            delta("ok"),
        ]);
        let turn = &r.transcript()[0];
        assert_eq!(turn.content.len(), 2);
        assert!(matches!(&turn.content[0], MessageItem::Log { log, .. } if log.contains("12 packages")));
        assert_eq!(turn.visible_content().count(), 1);
    }

    #[test]
    fn deploy_result_records_preview() {
        let r = fold(&[
            start(),
            WebCreatorEvent::DeployResult {
                preview_url: "/preview/g1".into(),
                message: "deployed".into(),
            },
            done(),
        ]);
        match &r.transcript()[0].content[0] {
            MessageItem::Preview { preview, .. } => assert_eq!(preview.url, "/preview/g1"),
            other => panic!("Expected Preview, got {other:?}"),
        }
    }

    #[test]
    fn error_keeps_partial_content() {
        let r = fold(&[
            start(),
            delta("partial"),
            WebCreatorEvent::Error {
                reason: Some("model overloaded".into()),
                message: None,
            },
        ]);
        let turn = &r.transcript()[0];
        assert_eq!(turn.text(), "partial");
        assert_eq!(turn.error.as_deref(), Some("model overloaded"));
        assert_eq!(turn.kind, Some(TurnKind::Message));
        assert!(!r.is_streaming());
    }

    #[test]
    fn events_after_done_are_ignored() {
        let mut r = fold(&[start(), delta("x"), done()]);
        assert!(!r.apply(Some(&delta("late"))));
        assert_eq!(r.transcript()[0].text(), "x");
    }

    #[test]
    fn none_leaves_state_unchanged() {
        let mut r = fold(&[start(), delta("x")]);
        let before = r.transcript().to_vec();
        assert!(!r.apply(None));
        assert_eq!(r.transcript(), before.as_slice());
    }

    #[test]
    fn ping_changes_nothing() {
        let mut r = fold(&[start()]);
        let before = r.transcript().to_vec();
        assert!(!r.apply(Some(&WebCreatorEvent::Ping { timestamp: 1 })));
        assert_eq!(r.transcript(), before.as_slice());
    }

    #[test]
    fn turns_follow_start_order() {
        let r = fold(&[start(), delta("one"), done(), start(), delta("two"), done()]);
        let texts: Vec<_> = r.transcript().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn second_start_closes_dangling_turn() {
        let r = fold(&[start(), delta("one"), start(), delta("two")]);
        assert_eq!(r.transcript().len(), 2);
        assert_eq!(r.transcript()[0].kind, Some(TurnKind::Message));
        assert_eq!(r.transcript()[0].text(), "one");
        assert_eq!(r.transcript()[1].text(), "two");
    }

    #[test]
    fn user_message_then_turn() {
        let mut r = ChatReducer::new(ChatMode::WebCreator);
        r.push_user_message("Make it blue");
        r.apply(Some(&start()));
        assert_eq!(r.transcript().len(), 2);
        assert_eq!(r.transcript()[0].role, Role::User);
        assert_eq!(r.transcript()[0].text(), "Make it blue");
    }

    #[test]
    fn start_adopts_loading_placeholder() {
        let mut r = ChatReducer::new(ChatMode::Workflow);
        r.push_user_message("Build a triage flow");
        let placeholder = r.push_loading_placeholder();
        r.apply_workflow(Some(&WorkflowEvent::Start { data: json!({}) }));
        assert_eq!(r.transcript().len(), 2);
        assert_eq!(r.active_turn(), Some(placeholder.as_str()));
    }

    #[test]
    fn workflow_phases_replace_trailing_reasoning() {
        let mut r = ChatReducer::new(ChatMode::Workflow);
        r.apply_workflow(Some(&WorkflowEvent::Start { data: json!({}) }));
        r.apply_workflow(Some(&WorkflowEvent::Phase {
            phase: "prepare".into(),
            message: Some("Reading request".into()),
        }));
        r.apply_workflow(Some(&WorkflowEvent::Phase {
            phase: "generate".into(),
            message: None,
        }));
        let turn = &r.transcript()[0];
        assert_eq!(turn.kind, Some(TurnKind::Progress));
        assert_eq!(turn.content.len(), 1);
        assert!(matches!(&turn.content[0], MessageItem::Reasoning { reasoning, .. } if reasoning == "generate"));

        r.apply_workflow(Some(&WorkflowEvent::Done { data: None }));
        assert_eq!(r.transcript()[0].kind, Some(TurnKind::Message));
    }

    #[test]
    fn workflow_error_flags_turn() {
        let mut r = ChatReducer::new(ChatMode::Workflow);
        r.apply_workflow(Some(&WorkflowEvent::Start { data: json!({}) }));
        r.apply_workflow(Some(&WorkflowEvent::Error {
            message: Some("invalid spec".into()),
            reason: None,
            code: None,
        }));
        assert_eq!(r.transcript()[0].error.as_deref(), Some("invalid spec"));
    }

    #[test]
    fn detach_freezes_turn() {
        let mut r = fold(&[start(), delta("half")]);
        let detached = r.detach();
        assert!(detached.is_some());
        assert!(!r.apply(Some(&delta(" more"))));
        assert_eq!(r.transcript()[0].text(), "half");
        assert!(r.transcript()[0].is_loading());
    }

    #[test]
    fn replay_is_identical() {
        let log = vec![
            start(),
            delta("Hello"),
            tool_call("c1", "file_write"),
            WebCreatorEvent::ToolOutput {
                tool_call_id: "c1".into(),
                status: ToolStatus::Success,
            },
            WebCreatorEvent::Log {
                content: "built".into(),
            },
            done(),
        ];
        let a = serde_json::to_string(fold(&log).transcript()).unwrap();
        let b = serde_json::to_string(fold(&log).transcript()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn stage_progress_table() {
        assert_eq!(stage_progress("checking"), Some(10));
        assert_eq!(stage_progress("deployed"), Some(100));
        assert_eq!(stage_progress("warming"), None);
    }
}
