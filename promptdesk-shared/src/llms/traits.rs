//! # LLM Traits

use crate::llms::{
    errors::LLMResult,
    types::{CompletionChunk, CompletionRequest},
};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Type alias for a streamed completion
pub type CompletionStream =
    Pin<Box<dyn Stream<Item = LLMResult<CompletionChunk>> + Send + 'static>>;

/// A chat completion backend.
///
/// Implementations return a stream of text increments. Errors before the
/// first byte surface from `stream_chat`; errors after that surface as items
/// of the stream.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short identifier used in logs and metrics labels
    fn provider_name(&self) -> &str;

    /// Start a streaming completion
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent or the provider rejects it.
    async fn stream_chat(&self, request: CompletionRequest) -> LLMResult<CompletionStream>;
}
