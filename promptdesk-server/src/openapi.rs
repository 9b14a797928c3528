#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::{
    models::{
        AppendMessageRequest, AppendMessageResponse, Assistant, AssistantDetailResponse,
        AssistantListResponse, AssistantTranscript, AssistantUsage, Chat, ChatDetailResponse,
        ChatListResponse, ChatRequest, ChatSortField, ChatStats, ChatStreamEvent, ChatSummary,
        ChatTurn, CreateAssistantRequest, CreateAssistantResponse, CreateChatRequest, DailyStat,
        DeleteMessagesResponse, ErrorResponse, Message, MessageRole, Pagination, RecentActivity,
        SortOrder, StatsOverview, StatsResponse, TokenReport, TopConversation,
        UsageCorrectionRequest, UsageTotals, UserActivity, UserDetailResponse, UserListResponse,
        UserTranscript, UserUsage, WelcomeMessageRequest,
    },
    usage::CostEstimate,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

struct AdminTokenScheme;

impl Modify for AdminTokenScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PromptDesk API",
        version = "1.0.0",
        description = "Assistants, chats, streaming completions and usage analytics"
    ),
    paths(
        crate::handlers::chat::stream_chat,
        crate::handlers::assistants::create_assistant,
        crate::handlers::assistants::list_assistants,
        crate::handlers::assistants::get_assistant,
        crate::handlers::conversations::create_conversation,
        crate::handlers::conversations::list_conversations,
        crate::handlers::conversations::get_conversation,
        crate::handlers::conversations::list_messages,
        crate::handlers::conversations::append_message,
        crate::handlers::conversations::append_welcome,
        crate::handlers::conversations::correct_usage,
        crate::handlers::admin::stats,
        crate::handlers::admin::list_assistants,
        crate::handlers::admin::assistant_detail,
        crate::handlers::admin::list_users,
        crate::handlers::admin::user_detail,
        crate::handlers::admin::list_chats,
        crate::handlers::admin::chat_detail,
        crate::handlers::admin::delete_chat_messages,
    ),
    components(
        schemas(
            ErrorResponse,
            ChatRequest,
            ChatTurn,
            MessageRole,
            ChatStreamEvent,
            TokenReport,
            Assistant,
            CreateAssistantRequest,
            CreateAssistantResponse,
            Chat,
            CreateChatRequest,
            Message,
            AppendMessageRequest,
            AppendMessageResponse,
            WelcomeMessageRequest,
            UsageCorrectionRequest,
            UsageTotals,
            CostEstimate,
            Pagination,
            StatsOverview,
            DailyStat,
            TopConversation,
            RecentActivity,
            StatsResponse,
            UserActivity,
            AssistantUsage,
            AssistantListResponse,
            UserUsage,
            UserListResponse,
            UserTranscript,
            AssistantDetailResponse,
            AssistantTranscript,
            UserDetailResponse,
            ChatSortField,
            SortOrder,
            ChatSummary,
            ChatListResponse,
            ChatStats,
            ChatDetailResponse,
            DeleteMessagesResponse,
        )
    ),
    modifiers(&AdminTokenScheme),
    tags(
        (name = "Chat", description = "Streaming completions"),
        (name = "Assistants", description = "Assistant definitions"),
        (name = "Conversations", description = "Chats and their transcripts"),
        (name = "Admin", description = "Usage analytics and maintenance")
    )
)]
pub struct ApiDoc;
