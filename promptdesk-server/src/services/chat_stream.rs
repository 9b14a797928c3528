//! Streaming completion relay.
//!
//! A request is validated and turned into a provider request up front. Once
//! the provider accepts it, a spawned task forwards deltas into a bounded
//! channel that backs the SSE response body, then emits one token report and
//! the terminator.

use std::time::Instant;

use futures::StreamExt;
use metrics::{counter, gauge, histogram};
use shared::{
    config::Config,
    llms::{CompletionRequest, CompletionStream, ProviderMessage, TokenUsage},
    models::{ChatRequest, ChatStreamEvent, MessageRole, StreamFrame, TokenReport},
    usage::{TokenTally, estimate_tokens},
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, trace};

/// Request-level validation failures. All map to 400.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ChatRequestError {
    #[error("No messages to process")]
    NoMessages,
    #[error("At least one user message is required")]
    NoUserMessage,
}

/// Aborts the response body after streaming has begun.
#[derive(Debug, Error)]
#[error("completion stream aborted: {0}")]
pub struct RelayError(String);

pub type RelayItem = Result<StreamFrame, RelayError>;

/// Completion settings taken from configuration.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub channel_capacity: usize,
}

impl StreamSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_model: config.llm.default_model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            channel_capacity: config.sse.channel_capacity.max(1),
        }
    }
}

/// Estimates used when the provider does not report usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEstimate {
    pub system_prompt: u32,
    /// System prompt plus the last supplied turn.
    pub input: u32,
}

#[derive(Debug, Clone)]
pub struct PreparedChat {
    pub request: CompletionRequest,
    pub estimate: InputEstimate,
}

/// Checks the request shape before any side effect.
///
/// # Errors
/// Returns [`ChatRequestError`] for an empty turn list or one without a user turn.
pub fn validate_request(request: &ChatRequest) -> Result<(), ChatRequestError> {
    if request.messages.is_empty() {
        return Err(ChatRequestError::NoMessages);
    }
    if !request
        .messages
        .iter()
        .any(|turn| turn.role == MessageRole::User)
    {
        return Err(ChatRequestError::NoUserMessage);
    }
    Ok(())
}

/// Validates a chat request and builds the provider request from it.
///
/// # Errors
/// Same as [`validate_request`].
pub fn prepare(
    request: ChatRequest,
    settings: &StreamSettings,
) -> Result<PreparedChat, ChatRequestError> {
    validate_request(&request)?;

    let system_prompt = request
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty());

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(ProviderMessage::new(MessageRole::System, prompt));
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|turn| ProviderMessage::new(turn.role, turn.content_or_empty())),
    );

    let system_prompt_tokens = system_prompt.map_or(0, estimate_tokens);
    let last_turn_tokens = request
        .messages
        .last()
        .map_or(0, |turn| estimate_tokens(turn.content_or_empty()));

    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(&settings.default_model)
        .to_string();

    Ok(PreparedChat {
        request: CompletionRequest {
            model,
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        },
        estimate: InputEstimate {
            system_prompt: system_prompt_tokens,
            input: system_prompt_tokens + last_turn_tokens,
        },
    })
}

/// Final token figures. Provider usage wins over estimates.
#[must_use]
pub fn final_report(
    tally: &TokenTally,
    usage: Option<TokenUsage>,
    estimate: InputEstimate,
) -> TokenReport {
    let (assistant, input, reported_total) = match usage {
        Some(usage) => (
            usage.completion_tokens,
            usage.prompt_tokens,
            usage.total_tokens,
        ),
        None => (tally.estimate(), estimate.input, 0),
    };

    let total = if reported_total > 0 {
        reported_total
    } else {
        assistant + input
    };

    TokenReport {
        assistant,
        input,
        total,
        system_prompt_tokens: estimate.system_prompt,
    }
}

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed(TokenReport),
    Cancelled,
    Failed,
}

impl RelayOutcome {
    fn label(self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

struct ActiveStream;

impl ActiveStream {
    fn enter() -> Self {
        gauge!("chat_stream_active").increment(1.0);
        Self
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        gauge!("chat_stream_active").decrement(1.0);
    }
}

/// Spawns the relay task and returns the frames it produces.
#[must_use]
pub fn spawn_relay(
    upstream: CompletionStream,
    estimate: InputEstimate,
    capacity: usize,
) -> ReceiverStream<RelayItem> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        relay(upstream, estimate, tx).await;
    });
    ReceiverStream::new(rx)
}

/// Forwards provider deltas into `tx` until the provider finishes, fails, or
/// the receiver goes away.
pub async fn relay(
    mut upstream: CompletionStream,
    estimate: InputEstimate,
    tx: mpsc::Sender<RelayItem>,
) -> RelayOutcome {
    let _active = ActiveStream::enter();
    let started = Instant::now();
    let mut tally = TokenTally::new();
    let mut usage = None;

    let outcome = loop {
        let next = tokio::select! {
            () = tx.closed() => break RelayOutcome::Cancelled,
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if let Some(reported) = chunk.usage {
                    usage = Some(reported);
                }
                if chunk.delta.is_empty() {
                    continue;
                }

                let running = tally.push(&chunk.delta);
                trace!(running_estimate = running, "forwarding delta");
                let frame = StreamFrame::Event(ChatStreamEvent::Content {
                    content: chunk.delta,
                });
                if tx.send(Ok(frame)).await.is_err() {
                    break RelayOutcome::Cancelled;
                }
            }
            Some(Err(err)) => {
                error!(error = %err, "completion stream failed");
                let _ = tx.send(Err(RelayError(err.to_string()))).await;
                break RelayOutcome::Failed;
            }
            None => {
                let report = final_report(&tally, usage, estimate);
                let tokens = StreamFrame::Event(ChatStreamEvent::Tokens { tokens: report });
                if tx.send(Ok(tokens)).await.is_err() || tx.send(Ok(StreamFrame::Done)).await.is_err()
                {
                    break RelayOutcome::Cancelled;
                }
                break RelayOutcome::Completed(report);
            }
        }
    };

    drop(upstream);
    counter!("chat_streams_total", "outcome" => outcome.label()).increment(1);
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        RelayOutcome::Completed(report) => {
            histogram!("chat_stream_tokens", "kind" => "assistant").record(f64::from(report.assistant));
            histogram!("chat_stream_tokens", "kind" => "input").record(f64::from(report.input));
            info!(
                assistant_tokens = report.assistant,
                input_tokens = report.input,
                total_tokens = report.total,
                elapsed_ms,
                "completion stream finished"
            );
        }
        RelayOutcome::Cancelled => debug!(elapsed_ms, "client disconnected from completion stream"),
        RelayOutcome::Failed => {}
    }

    outcome
}
