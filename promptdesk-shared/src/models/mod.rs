pub mod admin;
pub mod assistant;
pub mod chat;
pub mod errors;
pub mod message;
pub mod streaming;

pub use admin::{
    AssistantDetailResponse, AssistantListResponse, AssistantTranscript, AssistantUsage,
    ChatDetailResponse, ChatListResponse, ChatPageQuery, ChatSortField, ChatStats, ChatSummary,
    DailyStat, DeleteMessagesResponse, PageQuery, Pagination, RecentActivity, SortOrder,
    StatsOverview, StatsResponse, TopConversation, UsageTotals, UserActivity, UserDetailResponse,
    UserListResponse, UserTranscript, UserUsage,
};
pub use assistant::{Assistant, CreateAssistantRequest, CreateAssistantResponse};
pub use chat::{Chat, ChatListQuery, ChatRequest, ChatTurn, CreateChatRequest, MessageRole};
pub use errors::ErrorResponse;
pub use message::{
    AppendMessageRequest, AppendMessageResponse, Message, UsageCorrectionRequest,
    WelcomeMessageRequest,
};
pub use streaming::{ChatStreamEvent, STREAM_DONE, StreamFrame, TokenReport};
