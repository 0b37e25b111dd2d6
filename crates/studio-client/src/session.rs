//! Per-panel sessions: submit a turn, follow its stream into the shared
//! state, reattach to an execution that is still running.

use studio_chat::store::{SharedState, StudioState};
use studio_chat::task_id::TaskIdStore;
use studio_core::error::Result;
use studio_core::message::ChatMode;
use studio_core::stream::{StudioEvent, WebCreatorEvent, WorkflowEvent};
use studio_core::workflow::StreamTicket;
use tokio_util::sync::CancellationToken;

use crate::api::StudioClient;
use crate::runner::{StreamController, StreamOutcome, run_stream};
use crate::sse::FrameStream;

/// Result of following one execution's stream.
#[derive(Debug)]
pub struct StreamRun {
    pub graph_id: String,
    pub execution_id: String,
    pub outcome: StreamOutcome,
}

type Apply<E> = fn(&mut StudioState, Option<&E>) -> bool;

// ---------------------------------------------------------------------------
// Web creator
// ---------------------------------------------------------------------------

/// Builds and refines the website generated for a workflow.
#[derive(Debug, Clone)]
pub struct WebCreatorSession {
    client: StudioClient,
    state: SharedState,
    tasks: TaskIdStore,
    controller: StreamController,
}

impl WebCreatorSession {
    pub fn new(client: StudioClient, state: SharedState, tasks: TaskIdStore) -> Self {
        Self {
            client,
            state,
            tasks,
            controller: StreamController::new(),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn tasks(&self) -> &TaskIdStore {
        &self.tasks
    }

    /// Replace the transcript with the stored conversation of `workflow_id`.
    pub async fn load_history(&self, workflow_id: &str) -> Result<()> {
        let entries = self.client.web_creator_history(workflow_id).await?;
        self.state.write().await.web_chat.load_history(entries);
        Ok(())
    }

    /// Send a prompt for `workflow_id` and follow the resulting stream.
    pub async fn send_message(&self, workflow_id: &str, text: &str) -> Result<StreamRun> {
        let token = begin_turn(&self.state, &self.controller, ChatMode::WebCreator, text).await;
        let ticket = self.client.create_web_creator_stream(workflow_id, text).await;
        let ticket = fail_on_err(&self.state, ChatMode::WebCreator, ticket).await?;
        self.tasks.set(&ticket.graph_id, &ticket.execution_id).await;

        let frames = self.client.web_creator_stream(&ticket.execution_id).await;
        let frames = fail_on_err(&self.state, ChatMode::WebCreator, frames).await?;
        let outcome = follow::<WebCreatorEvent>(
            &self.state,
            ChatMode::WebCreator,
            StudioState::apply_web_event,
            frames,
            token,
            self.client.config().idle_timeout,
        )
        .await;
        Ok(run(ticket, outcome))
    }

    /// Reattach to the last execution recorded for `workflow_id` if the
    /// backend still reports it as running.
    pub async fn resume(&self, workflow_id: &str) -> Result<Option<StreamRun>> {
        let Some(execution_id) = self.tasks.get(workflow_id).await else {
            return Ok(None);
        };
        let execution = self.client.execution(&execution_id).await?;
        if !execution.status.is_resumable() {
            tracing::debug!(%execution_id, status = ?execution.status, "execution not resumable");
            return Ok(None);
        }

        let token = self.controller.begin();
        self.state
            .write()
            .await
            .set_streaming(ChatMode::WebCreator, true);
        let frames = self.client.web_creator_stream(&execution_id).await;
        let frames = fail_on_err(&self.state, ChatMode::WebCreator, frames).await?;
        let outcome = follow::<WebCreatorEvent>(
            &self.state,
            ChatMode::WebCreator,
            StudioState::apply_web_event,
            frames,
            token,
            self.client.config().idle_timeout,
        )
        .await;
        Ok(Some(StreamRun {
            graph_id: execution.graph_id,
            execution_id,
            outcome,
        }))
    }

    /// Stop the running stream, keeping whatever it produced so far.
    pub async fn abort(&self) {
        abort_panel(&self.state, &self.controller, ChatMode::WebCreator).await;
    }
}

// ---------------------------------------------------------------------------
// Workflow builder
// ---------------------------------------------------------------------------

/// Creates workflows from a natural-language description.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    client: StudioClient,
    state: SharedState,
    tasks: TaskIdStore,
    controller: StreamController,
}

impl WorkflowSession {
    pub fn new(client: StudioClient, state: SharedState, tasks: TaskIdStore) -> Self {
        Self {
            client,
            state,
            tasks,
            controller: StreamController::new(),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn tasks(&self) -> &TaskIdStore {
        &self.tasks
    }

    pub async fn send_message(&self, text: &str) -> Result<StreamRun> {
        let token = begin_turn(&self.state, &self.controller, ChatMode::Workflow, text).await;
        let ticket = self.client.create_workflow_stream(text).await;
        let ticket = fail_on_err(&self.state, ChatMode::Workflow, ticket).await?;
        self.tasks.set(&ticket.graph_id, &ticket.execution_id).await;

        let frames = self.client.workflow_stream(&ticket.execution_id).await;
        let frames = fail_on_err(&self.state, ChatMode::Workflow, frames).await?;
        let outcome = follow::<WorkflowEvent>(
            &self.state,
            ChatMode::Workflow,
            StudioState::apply_workflow_event,
            frames,
            token,
            self.client.config().idle_timeout,
        )
        .await;
        Ok(run(ticket, outcome))
    }

    pub async fn resume(&self, workflow_id: &str) -> Result<Option<StreamRun>> {
        let Some(execution_id) = self.tasks.get(workflow_id).await else {
            return Ok(None);
        };
        let execution = self.client.execution(&execution_id).await?;
        if !execution.status.is_resumable() {
            tracing::debug!(%execution_id, status = ?execution.status, "execution not resumable");
            return Ok(None);
        }

        let token = self.controller.begin();
        self.state
            .write()
            .await
            .set_streaming(ChatMode::Workflow, true);
        let frames = self.client.workflow_stream(&execution_id).await;
        let frames = fail_on_err(&self.state, ChatMode::Workflow, frames).await?;
        let outcome = follow::<WorkflowEvent>(
            &self.state,
            ChatMode::Workflow,
            StudioState::apply_workflow_event,
            frames,
            token,
            self.client.config().idle_timeout,
        )
        .await;
        Ok(Some(StreamRun {
            graph_id: execution.graph_id,
            execution_id,
            outcome,
        }))
    }

    pub async fn abort(&self) {
        abort_panel(&self.state, &self.controller, ChatMode::Workflow).await;
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

fn run(ticket: StreamTicket, outcome: StreamOutcome) -> StreamRun {
    StreamRun {
        graph_id: ticket.graph_id,
        execution_id: ticket.execution_id,
        outcome,
    }
}

/// Supersede any running stream of the panel and record the user's prompt.
/// The workflow panel also shows a loading reply until the stream's `start`
/// adopts it.
async fn begin_turn(
    state: &SharedState,
    controller: &StreamController,
    mode: ChatMode,
    text: &str,
) -> CancellationToken {
    let token = controller.begin();
    let mut state = state.write().await;
    let chat = state.chat_mut(mode);
    chat.detach();
    chat.push_user_message(text);
    if mode == ChatMode::Workflow {
        chat.push_loading_placeholder();
    }
    state.set_streaming(mode, true);
    token
}

/// Clear the busy flag and surface a network failure before handing the
/// error back.
async fn fail_on_err<T>(state: &SharedState, mode: ChatMode, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        tracing::warn!(%mode, error = %e, "could not open stream");
        let mut state = state.write().await;
        state.set_streaming(mode, false);
        if e.is_network() {
            state.notify(format!("Network error: {e}"));
        }
    }
    result
}

async fn follow<E: StudioEvent>(
    state: &SharedState,
    mode: ChatMode,
    apply: Apply<E>,
    frames: FrameStream,
    token: CancellationToken,
    idle_timeout: std::time::Duration,
) -> StreamOutcome {
    let outcome = run_stream(frames, &token, idle_timeout, |event: E| {
        let state = state.clone();
        let token = token.clone();
        async move {
            let mut state = state.write().await;
            // abort() may have run while the lock was held elsewhere
            if !token.is_cancelled() {
                apply(&mut state, Some(&event));
            }
        }
    })
    .await;

    let mut guard = state.write().await;
    // A cancelled run was settled by whoever cancelled it, and the panel may
    // already belong to a newer stream.
    if token.is_cancelled() {
        return outcome;
    }
    if let StreamOutcome::Disconnected { error } = &outcome {
        guard.notify(format!("Connection lost: {error}"));
    }
    if outcome.is_interrupted() {
        guard.chat_mut(mode).detach();
    }
    guard.set_streaming(mode, false);
    outcome
}

async fn abort_panel(state: &SharedState, controller: &StreamController, mode: ChatMode) {
    if controller.abort() {
        tracing::info!(%mode, "stream aborted by user");
    }
    let mut state = state.write().await;
    state.chat_mut(mode).detach();
    state.set_streaming(mode, false);
}
