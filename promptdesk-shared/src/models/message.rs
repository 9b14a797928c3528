use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::chat::MessageRole;

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Tokens attributed to this message (estimate or provider-reported).
    pub token_count: i64,
    /// System prompt tokens charged alongside this message.
    pub system_prompt_tokens: i64,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/conversations/{chat_id}/messages`.
///
/// Fields are optional at the wire level so missing values produce a
/// validation error instead of a generic decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    #[serde(default)]
    pub role: Option<MessageRole>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub token_count: Option<i64>,
    #[serde(default)]
    pub system_prompt_tokens: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageResponse {
    pub success: bool,
    /// `true` when an identical message already existed and was returned instead.
    pub duplicate: bool,
    pub message: Message,
}

/// Body of `POST /api/conversations/{chat_id}/welcome`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMessageRequest {
    pub welcome_message: String,
}

/// Authoritative usage figures replacing a message's estimates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageCorrectionRequest {
    #[serde(default)]
    pub token_count: Option<i64>,
    #[serde(default)]
    pub system_prompt_tokens: Option<i64>,
}
