//! Relay orchestrator: drives one remote generation per request.
//!
//! For every request the engine:
//! 1. Opens a streaming call on the [`GenerativeModel`]
//! 2. Forwards each non-empty fragment, in order, over a channel
//! 3. Converts the first failure into a single [`RelayEvent::StreamError`]
//! 4. Closes the channel, which ends the HTTP body

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::RelayMetrics;
use crate::relay::model::{GenerativeModel, Prompt};

/// A relay request.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    /// Unique request ID.
    pub request_id: String,

    /// Route label for logs and metrics ("chat", "vision").
    pub route: &'static str,

    /// What to send to the model.
    pub prompt: Prompt,
}

/// Output of a relay, in the order the client must see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A non-empty piece of generated text.
    Fragment(String),
    /// The remote call failed; always the last event.
    StreamError(String),
}

/// Lifecycle of one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Streaming,
    Done,
    Error,
}

impl RelayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RelayState::Done | RelayState::Error)
    }

    /// Advance, ignoring anything that leaves a terminal state.
    fn advance(&mut self, next: RelayState, request_id: &str) {
        if self.is_terminal() {
            return;
        }
        debug!(request_id, from = %self, to = %next, "Relay state");
        *self = next;
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayState::Idle => "idle",
            RelayState::Streaming => "streaming",
            RelayState::Done => "done",
            RelayState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of a finished relay task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub state: RelayState,
    pub fragments: usize,
}

/// The relay engine. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct RelayEngine {
    model: Arc<dyn GenerativeModel>,
    metrics: Arc<RelayMetrics>,
    buffer: usize,
}

impl RelayEngine {
    pub fn new(model: Arc<dyn GenerativeModel>, metrics: Arc<RelayMetrics>, buffer: usize) -> Self {
        Self {
            model,
            metrics,
            buffer: buffer.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Start relaying a request, streaming events to the returned receiver.
    ///
    /// Each call issues its own remote call; nothing is cached or shared.
    pub fn relay(&self, request: RelayRequest) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let model = self.model.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            run_relay(model.as_ref(), &metrics, request, tx).await;
        });

        rx
    }
}

/// Drive one relay to a terminal state.
///
/// Stops early when the receiver is dropped (client went away); the upstream
/// stream is dropped with it.
pub async fn run_relay(
    model: &dyn GenerativeModel,
    metrics: &RelayMetrics,
    request: RelayRequest,
    tx: mpsc::Sender<RelayEvent>,
) -> RelaySummary {
    let RelayRequest {
        request_id,
        route,
        prompt,
    } = request;

    info!(
        request_id,
        route,
        model = model.name(),
        prompt_chars = prompt.text().chars().count(),
        "Starting relay"
    );

    let mut state = RelayState::Idle;
    let mut fragments = 0;
    state.advance(RelayState::Streaming, &request_id);

    let failure = match model.stream_generate(&prompt).await {
        Err(e) => Some(e),
        Ok(mut stream) => loop {
            match stream.next().await {
                None => break None,
                Some(Err(e)) => break Some(e),
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => {
                    if tx.send(RelayEvent::Fragment(text)).await.is_err() {
                        debug!(request_id, "Receiver dropped, abandoning upstream stream");
                        break None;
                    }
                    fragments += 1;
                    metrics.fragment(route);
                }
            }
        },
    };

    match failure {
        Some(e) => {
            let description = e.to_string();
            warn!(request_id, route, fragments, error = %description, "Relay failed");
            metrics.stream_error(route);
            let _ = tx.send(RelayEvent::StreamError(description)).await;
            state.advance(RelayState::Error, &request_id);
        }
        None => state.advance(RelayState::Done, &request_id),
    }

    info!(request_id, route, fragments, state = %state, "Relay complete");

    RelaySummary { state, fragments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::relay::model::FragmentStream;
    use async_trait::async_trait;

    /// Replays a fixed script of fragments.
    struct Scripted(Vec<Result<&'static str, &'static str>>);

    #[async_trait]
    impl GenerativeModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream_generate(&self, _prompt: &Prompt) -> Result<FragmentStream, RelayError> {
            let items: Vec<_> = self
                .0
                .iter()
                .map(|r| match r {
                    Ok(t) => Ok(t.to_string()),
                    Err(e) => Err(RelayError::Stream(e.to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn request() -> RelayRequest {
        RelayRequest {
            request_id: "test-1".to_string(),
            route: "chat",
            prompt: Prompt::Text("Hello".to_string()),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<RelayEvent>) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_skips_empty_fragments() {
        let metrics = Arc::new(RelayMetrics::new().unwrap());
        let model = Arc::new(Scripted(vec![Ok("Hi"), Ok(" there"), Ok(""), Ok("!")]));
        let engine = RelayEngine::new(model, metrics.clone(), 4);

        let events = collect(engine.relay(request())).await;
        assert_eq!(
            events,
            vec![
                RelayEvent::Fragment("Hi".into()),
                RelayEvent::Fragment(" there".into()),
                RelayEvent::Fragment("!".into()),
            ]
        );
        assert_eq!(metrics.fragments_for("chat"), 3);
    }

    #[tokio::test]
    async fn test_error_is_last_event() {
        let metrics = RelayMetrics::new().unwrap();
        let model = Scripted(vec![Ok("partial"), Err("connection reset"), Ok("unreachable")]);
        let (tx, rx) = mpsc::channel(8);

        let summary = run_relay(&model, &metrics, request(), tx).await;
        assert_eq!(summary.state, RelayState::Error);
        assert_eq!(summary.fragments, 1);
        assert_eq!(
            collect(rx).await,
            vec![
                RelayEvent::Fragment("partial".into()),
                RelayEvent::StreamError("connection reset".into()),
            ]
        );
        assert_eq!(metrics.stream_errors_for("chat"), 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_relay() {
        let metrics = RelayMetrics::new().unwrap();
        let model = Scripted(vec![Ok("a"), Ok("b"), Ok("c")]);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let summary = run_relay(&model, &metrics, request(), tx).await;
        assert_eq!(summary.state, RelayState::Done);
        assert_eq!(summary.fragments, 0);
        assert_eq!(metrics.fragments_for("chat"), 0);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut state = RelayState::Idle;
        state.advance(RelayState::Streaming, "r");
        state.advance(RelayState::Error, "r");
        state.advance(RelayState::Done, "r");
        assert_eq!(state, RelayState::Error);
    }
}
