//! # OpenAI-compatible streaming provider

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::llm::LlmConfig;
use crate::llms::{
    errors::{LLMError, LLMResult},
    sse::SseDecoder,
    traits::{CompletionStream, LLMProvider},
    types::{CompletionChunk, CompletionRequest, ProviderMessage, TokenUsage},
};
use crate::models::streaming::STREAM_DONE;

/// Client for `POST {base_url}/chat/completions` with `stream: true`.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ProviderMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Default)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl OpenAiProvider {
    /// Builds a provider from configuration.
    ///
    /// # Errors
    /// Returns [`LLMError::MissingCredentials`] when no API key is configured,
    /// or an HTTP error if the client cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> LLMResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LLMError::MissingCredentials {
                provider: config.provider.clone(),
            })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn stream_chat(&self, request: CompletionRequest) -> LLMResult<CompletionStream> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending streaming completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LLMError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(decode_stream(response.bytes_stream()))
    }
}

/// Turns a raw SSE byte stream into completion chunks.
///
/// The stream ends at `[DONE]` or when the body ends. Transport errors and
/// error payloads are yielded as `Err` items.
pub fn decode_stream<S, B, E>(bytes: S) -> CompletionStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut bytes = Box::pin(bytes);

        while let Some(next) = bytes.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(LLMError::stream_interrupted(err.to_string()));
                    return;
                }
            };

            for data in decoder.push(chunk.as_ref()) {
                if data.trim() == STREAM_DONE {
                    return;
                }
                match parse_chunk(&data) {
                    Ok(Some(parsed)) => yield Ok(parsed),
                    Ok(None) => {}
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        if let Some(data) = decoder.finish() {
            if data.trim() != STREAM_DONE {
                match parse_chunk(&data) {
                    Ok(Some(parsed)) => yield Ok(parsed),
                    Ok(None) => {}
                    Err(err) => yield Err(err),
                }
            }
        } else {
            warn!("provider stream ended without a terminator");
        }
    })
}

/// Decodes one `data:` payload. Returns `None` for keep-alive style chunks
/// carrying neither text nor usage.
///
/// # Errors
/// Returns [`LLMError::Decode`] for malformed JSON and [`LLMError::Api`] for
/// an in-stream error object.
pub fn parse_chunk(data: &str) -> LLMResult<Option<CompletionChunk>> {
    let chunk: StreamChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        return Err(LLMError::Api {
            status: 200,
            message: error.message,
        });
    }

    let delta: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if delta.is_empty() && chunk.usage.is_none() {
        return Ok(None);
    }

    Ok(Some(CompletionChunk {
        delta,
        usage: chunk.usage,
    }))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn frames(parts: &[&str]) -> Vec<Result<Vec<u8>, std::io::Error>> {
        parts.iter().map(|part| Ok(part.as_bytes().to_vec())).collect()
    }

    #[test]
    fn parses_content_and_usage_chunks() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk, CompletionChunk::text("Hel"));

        let chunk = parse_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":2,"total_tokens":7}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            chunk.usage,
            Some(TokenUsage {
                prompt_tokens: 5,
                completion_tokens: 2,
                total_tokens: 7
            })
        );

        assert!(parse_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn in_stream_error_objects_become_api_errors() {
        let err = parse_chunk(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(matches!(err, LLMError::Api { ref message, .. } if message == "overloaded"));
        assert!(matches!(parse_chunk("not json"), Err(LLMError::Decode(_))));
    }

    #[tokio::test]
    async fn decodes_stream_until_done() {
        let body = frames(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: {\"choices\":[],",
            "\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7}}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]);

        let chunks: Vec<_> = decode_stream(stream::iter(body)).collect().await;
        let chunks: Vec<CompletionChunk> = chunks.into_iter().map(Result::unwrap).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta, "Hel");
        assert_eq!(chunks[1].delta, "lo");
        assert_eq!(chunks[2].usage.map(|usage| usage.total_tokens), Some(7));
    }

    #[tokio::test]
    async fn transport_errors_end_the_stream_with_an_error() {
        let body: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];

        let items: Vec<_> = decode_stream(stream::iter(body)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(LLMError::Stream { .. })));
    }

    #[test]
    fn requires_credentials() {
        let config = LlmConfig::default();
        assert!(matches!(
            OpenAiProvider::from_config(&config),
            Err(LLMError::MissingCredentials { .. })
        ));

        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://localhost:9999/v1/".into(),
            ..LlmConfig::default()
        };
        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn extracts_error_messages_from_bodies() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(error_message("upstream down"), "upstream down");
    }
}
