//! # LLM Integration Module
//!
//! A provider-neutral interface for streaming chat completions plus an
//! implementation for OpenAI-compatible HTTP APIs.
//!
//! ## Architecture
//!
//! - [`LLMProvider`] - trait implemented by every backend
//! - [`CompletionRequest`] / [`CompletionChunk`] - request and streamed increments
//! - [`OpenAiProvider`] - `reqwest` client decoding the provider's SSE body
//!
//! ## Usage
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use shared::llms::{CompletionRequest, LLMProvider, OpenAiProvider};
//!
//! let provider = OpenAiProvider::from_config(&config.llm)?;
//! let mut stream = provider.stream_chat(request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.delta);
//! }
//! ```

pub mod errors;
pub mod openai;
pub mod sse;
pub mod traits;
pub mod types;

// Re-export the main public APIs
pub use errors::{LLMError, LLMResult};
pub use openai::OpenAiProvider;
pub use sse::SseDecoder;
pub use traits::{CompletionStream, LLMProvider};
pub use types::{CompletionChunk, CompletionRequest, ProviderMessage, TokenUsage};
