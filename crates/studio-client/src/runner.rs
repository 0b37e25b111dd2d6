//! Cancellable read loop over a stream of SSE frames.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use studio_core::error::StreamError;
use studio_core::stream::{SseFrame, StudioEvent};

/// How a stream run ended.
#[derive(Debug)]
pub enum StreamOutcome {
    /// A terminal success event (`done`) was delivered.
    Completed,
    /// A terminal `error` event was delivered.
    Failed { reason: String },
    /// The run was cancelled through its token.
    Aborted,
    /// Transport failure or idle timeout.
    Disconnected { error: StreamError },
    /// The server closed the stream without a terminal event.
    Ended,
}

impl StreamOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The turn was left open and should be detached from the reducer.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Aborted | Self::Disconnected { .. } | Self::Ended
        )
    }
}

/// Keeps at most one stream alive per panel.
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever stream is running and hand out a token for the next.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancel the current stream, if any. Returns whether one was running.
    pub fn abort(&self) -> bool {
        match self.current.lock().take() {
            Some(token) => {
                let live = !token.is_cancelled();
                token.cancel();
                live
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

/// Pull frames until a terminal event, cancellation, end of stream or
/// `idle_timeout` without any frame. Keepalives reset the timer but are not
/// delivered. Nothing is delivered once `token` is cancelled.
pub async fn run_stream<E, S, F, Fut>(
    frames: S,
    token: &CancellationToken,
    idle_timeout: Duration,
    mut on_event: F,
) -> StreamOutcome
where
    E: StudioEvent,
    S: Stream<Item = Result<SseFrame, StreamError>>,
    F: FnMut(E) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut frames = std::pin::pin!(frames);

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::info!("stream aborted");
                return StreamOutcome::Aborted;
            }
            next = tokio::time::timeout(idle_timeout, frames.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                let secs = idle_timeout.as_secs();
                tracing::warn!(secs, "stream went idle");
                return StreamOutcome::Disconnected {
                    error: StreamError::IdleTimeout { secs },
                };
            }
            Ok(None) => {
                tracing::info!("stream ended without a terminal event");
                return StreamOutcome::Ended;
            }
            Ok(Some(Err(error))) => {
                tracing::warn!(%error, "stream dropped");
                return StreamOutcome::Disconnected { error };
            }
            Ok(Some(Ok(frame))) => frame,
        };

        if token.is_cancelled() {
            return StreamOutcome::Aborted;
        }
        let Some(event) = E::parse(&frame) else {
            continue;
        };
        if event.is_keepalive() {
            continue;
        }

        let terminal = event.is_terminal();
        let failure = event.failure();
        on_event(event).await;

        if terminal {
            return match failure {
                Some(reason) => {
                    tracing::info!(%reason, "stream finished with error");
                    StreamOutcome::Failed { reason }
                }
                None => {
                    tracing::info!("stream finished");
                    StreamOutcome::Completed
                }
            };
        }
    }
}
