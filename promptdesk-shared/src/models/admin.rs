//! Response and query types for the admin analytics surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{assistant::Assistant, chat::Chat, message::Message};
use crate::usage::pricing::CostEstimate;

/// Message and token sums over a set of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub total_messages: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub user_tokens: u64,
    pub assistant_tokens: u64,
    pub system_prompt_tokens: u64,
    /// `user_tokens + assistant_tokens + system_prompt_tokens`.
    pub total_tokens: u64,
}

impl UsageTotals {
    /// Tokens billed as model input.
    #[must_use]
    pub const fn input_tokens(&self) -> u64 {
        self.user_tokens + self.system_prompt_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Common paging and search parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number. Values below 1 are treated as 1.
    pub page: Option<i64>,
    /// Page size, clamped to the configured maximum.
    pub limit: Option<i64>,
    /// Case-insensitive substring filter.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatSortField {
    #[default]
    UpdatedAt,
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ChatPageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Matches title, user fingerprint or chat id.
    pub search: Option<String>,
    pub sort_by: Option<ChatSortField>,
    pub sort_order: Option<SortOrder>,
}

impl ChatPageQuery {
    #[must_use]
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverview {
    pub total_assistants: u64,
    pub total_users: u64,
    pub total_conversations: u64,
    pub totals: UsageTotals,
    pub estimated_cost: CostEstimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    /// Distinct chats with at least one message that day.
    pub conversations: u64,
    pub messages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopConversation {
    pub chat_id: Uuid,
    pub title: String,
    pub user_fingerprint: String,
    pub assistant_id: Option<Uuid>,
    pub assistant_name: Option<String>,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub conversations_last_week: u64,
    pub messages_last_week: u64,
}

/// Body of `GET /api/admin/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub overview: StatsOverview,
    pub daily_stats: Vec<DailyStat>,
    pub top_conversations: Vec<TopConversation>,
    pub recent_activity: RecentActivity,
}

/// One user's activity with a given assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub fingerprint: String,
    pub totals: UsageTotals,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistantUsage {
    pub assistant_id: Uuid,
    pub assistant_name: String,
    pub model: String,
    pub user_count: u64,
    pub conversation_count: u64,
    pub totals: UsageTotals,
    pub estimated_cost: CostEstimate,
    /// `None` for an assistant without messages.
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<UserActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistantListResponse {
    pub assistants: Vec<AssistantUsage>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub fingerprint: String,
    pub conversation_count: u64,
    pub assistant_count: u64,
    pub totals: UsageTotals,
    pub estimated_cost: CostEstimate,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserUsage>,
    pub pagination: Pagination,
}

/// A user's messages with one assistant, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserTranscript {
    pub fingerprint: String,
    pub totals: UsageTotals,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Body of `GET /api/admin/assistants/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistantDetailResponse {
    pub assistant_stats: AssistantUsage,
    pub users: Vec<UserTranscript>,
}

/// A user's messages with one assistant (or with no assistant), oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssistantTranscript {
    pub assistant_id: Option<Uuid>,
    pub assistant_name: Option<String>,
    pub totals: UsageTotals,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Body of `GET /api/admin/users/{fingerprint}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailResponse {
    pub user_stats: UserUsage,
    pub assistants: Vec<AssistantTranscript>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat: Chat,
    pub assistant_name: Option<String>,
    pub message_count: u64,
    pub last_message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatListResponse {
    pub chats: Vec<ChatSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub totals: UsageTotals,
    /// Milliseconds between chat creation and its last update.
    pub duration_ms: i64,
    pub estimated_cost: CostEstimate,
}

/// Body of `GET /api/admin/chats/{chat_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetailResponse {
    pub chat: Chat,
    pub assistant: Option<Assistant>,
    pub messages: Vec<Message>,
    pub stats: ChatStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteMessagesResponse {
    pub success: bool,
    pub deleted: u64,
}
