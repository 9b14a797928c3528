//! Persistence boundary for assistants, chats and messages.

use async_trait::async_trait;
use shared::models::{Assistant, Chat, Message, MessageRole};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Maps constraint violations onto domain errors; everything else stays a
    /// database error.
    pub(crate) fn from_db_error(err: sqlx::Error, missing: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                // foreign_key_violation
                Some("23503") => return StoreError::NotFound(missing.to_string()),
                // check_violation
                Some("23514") => return StoreError::Validation(db.message().to_string()),
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewAssistant {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct NewChat {
    pub title: String,
    pub user_fingerprint: String,
    pub assistant_id: Option<Uuid>,
}

/// A validated message ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub token_count: i64,
    pub system_prompt_tokens: i64,
}

/// Result of an append. A duplicate is a successful no-op carrying the
/// message that was already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Created(Message),
    Duplicate(Message),
}

impl AppendOutcome {
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    #[must_use]
    pub fn message(&self) -> &Message {
        match self {
            Self::Created(message) | Self::Duplicate(message) => message,
        }
    }

    #[must_use]
    pub fn into_message(self) -> Message {
        match self {
            Self::Created(message) | Self::Duplicate(message) => message,
        }
    }
}

/// A message joined with the owning chat's grouping keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub message: Message,
    pub user_fingerprint: String,
    pub assistant_id: Option<Uuid>,
}

/// Storage backend. Implemented for Postgres and for an in-process map used
/// when no database is configured.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Backend label for logs.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    async fn create_assistant(&self, new: NewAssistant) -> StoreResult<Assistant>;
    async fn get_assistant(&self, id: Uuid) -> StoreResult<Option<Assistant>>;
    /// All assistants ordered by name.
    async fn list_assistants(&self) -> StoreResult<Vec<Assistant>>;

    /// Fails with [`StoreError::NotFound`] when `assistant_id` is unknown.
    async fn create_chat(&self, new: NewChat) -> StoreResult<Chat>;
    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>>;
    async fn list_chats(&self) -> StoreResult<Vec<Chat>>;
    /// Chats of one user, most recently updated first.
    async fn list_chats_for_user(&self, fingerprint: &str) -> StoreResult<Vec<Chat>>;

    /// Appends a message unless one with the same role and content already
    /// exists in the chat. Touches the chat's `updated_at` on creation.
    async fn append_message(&self, chat_id: Uuid, new: NewMessage) -> StoreResult<AppendOutcome>;
    /// Messages of one chat, oldest first.
    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>>;
    /// Overwrites the token figures of one message with provider-reported values.
    async fn correct_usage(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        token_count: Option<i64>,
        system_prompt_tokens: Option<i64>,
    ) -> StoreResult<Message>;
    /// Removes every message of a chat and returns how many were deleted.
    async fn delete_messages(&self, chat_id: Uuid) -> StoreResult<u64>;

    /// Every message with its chat's grouping keys, oldest first.
    async fn message_records(&self) -> StoreResult<Vec<MessageRecord>>;
}
