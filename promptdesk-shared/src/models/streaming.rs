use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of the terminating frame of a completion stream.
pub const STREAM_DONE: &str = "[DONE]";

/// Final token accounting for one streamed reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    pub assistant: u32,
    pub input: u32,
    pub total: u32,
    pub system_prompt_tokens: u32,
}

/// JSON payload of one `data:` frame on the completion stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ChatStreamEvent {
    /// An incremental fragment of the reply.
    Content { content: String },
    /// Sent once, after the last fragment.
    Tokens { tokens: TokenReport },
}

/// A decoded frame as seen by a stream consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Event(ChatStreamEvent),
    Done,
}

impl StreamFrame {
    /// Decodes the payload of a `data:` line.
    ///
    /// # Errors
    /// Returns the JSON error when the payload is neither the terminator nor
    /// a known event.
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        let data = data.trim();
        if data == STREAM_DONE {
            return Ok(Self::Done);
        }
        serde_json::from_str(data).map(Self::Event)
    }
}
