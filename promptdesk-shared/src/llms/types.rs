//! # Provider request and response types

use serde::{Deserialize, Serialize};

use crate::models::chat::MessageRole;

/// One message in the list sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ProviderMessage {
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A streaming chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token usage as reported by the provider. Authoritative over estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One increment of a streamed completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionChunk {
    /// Text appended to the reply; may be empty.
    pub delta: String,
    /// Present on the chunk that carries usage, usually the last one.
    pub usage: Option<TokenUsage>,
}

impl CompletionChunk {
    #[must_use]
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            usage: None,
        }
    }

    #[must_use]
    pub fn usage(usage: TokenUsage) -> Self {
        Self {
            delta: String::new(),
            usage: Some(usage),
        }
    }
}
