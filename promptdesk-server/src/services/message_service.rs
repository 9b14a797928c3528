use std::{fmt, sync::Arc};

use shared::models::{
    AppendMessageRequest, Message, MessageRole, UsageCorrectionRequest, WelcomeMessageRequest,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store::{AppendOutcome, ChatStore, NewMessage, StoreError, StoreResult};

/// Append/list gateway for chat transcripts.
///
/// Repeating an append with the same role and content is a successful no-op,
/// so clients may retry a turn (or a welcome message) safely.
#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn ChatStore>,
}

impl fmt::Debug for MessageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageService")
            .field("store", &self.store.backend())
            .finish()
    }
}

impl MessageService {
    /// Creates a new message service.
    ///
    /// # Arguments
    /// * `store` - Backend holding chats and messages.
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Validates and appends a message to a chat.
    ///
    /// # Arguments
    /// * `chat_id` - The chat receiving the message.
    /// * `request` - Role, content and optional token figures.
    ///
    /// # Returns
    /// [`AppendOutcome::Created`] for a new row, [`AppendOutcome::Duplicate`]
    /// when an identical message was already stored.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] for missing or invalid fields,
    /// [`StoreError::NotFound`] for an unknown chat, and
    /// [`StoreError::Database`] for backend failures.
    #[instrument(name = "messages.append", skip(self, request), err)]
    pub async fn append(
        &self,
        chat_id: Uuid,
        request: AppendMessageRequest,
    ) -> StoreResult<AppendOutcome> {
        let new = validate_append(request)?;
        self.store_message(chat_id, new).await
    }

    /// Appends an assistant greeting. Repeated greetings collapse into one.
    ///
    /// # Errors
    /// Same as [`MessageService::append`].
    #[instrument(name = "messages.append_welcome", skip(self, request), err)]
    pub async fn append_welcome(
        &self,
        chat_id: Uuid,
        request: WelcomeMessageRequest,
    ) -> StoreResult<AppendOutcome> {
        let Some(content) = normalize_content(&request.welcome_message) else {
            return Err(StoreError::Validation(
                "welcomeMessage is required".to_string(),
            ));
        };

        self.store_message(
            chat_id,
            NewMessage {
                role: MessageRole::Assistant,
                content,
                token_count: 0,
                system_prompt_tokens: 0,
            },
        )
        .await
    }

    async fn store_message(&self, chat_id: Uuid, new: NewMessage) -> StoreResult<AppendOutcome> {
        let outcome = self.store.append_message(chat_id, new).await?;
        let result = if outcome.is_duplicate() {
            debug!(message_id = %outcome.message().id, "duplicate append ignored");
            "duplicate"
        } else {
            "created"
        };
        metrics::counter!("messages_appended_total", "result" => result).increment(1);
        Ok(outcome)
    }

    /// Lists a chat's messages, oldest first.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown chat.
    pub async fn list(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        self.store.list_messages(chat_id).await
    }

    /// Replaces estimated token figures with provider-reported ones.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] when nothing is supplied or a value
    /// is negative, and [`StoreError::NotFound`] for an unknown message.
    #[instrument(name = "messages.correct_usage", skip(self), err)]
    pub async fn correct_usage(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        request: UsageCorrectionRequest,
    ) -> StoreResult<Message> {
        if request.token_count.is_none() && request.system_prompt_tokens.is_none() {
            return Err(StoreError::Validation(
                "tokenCount or systemPromptTokens is required".to_string(),
            ));
        }
        check_non_negative(request.token_count)?;
        check_non_negative(request.system_prompt_tokens)?;

        self.store
            .correct_usage(
                chat_id,
                message_id,
                request.token_count,
                request.system_prompt_tokens,
            )
            .await
    }

    /// Deletes every message of a chat.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown chat.
    #[instrument(name = "messages.delete_all", skip(self), err)]
    pub async fn delete_all(&self, chat_id: Uuid) -> StoreResult<u64> {
        self.store.delete_messages(chat_id).await
    }
}

fn check_non_negative(value: Option<i64>) -> StoreResult<()> {
    match value {
        Some(value) if value < 0 => Err(StoreError::Validation(
            "Token counts must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Content as stored: surrounding whitespace removed, blank is `None`.
/// Both append paths share it so dedup sees the same text.
fn normalize_content(content: &str) -> Option<String> {
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// Single validation step in front of the store.
///
/// # Errors
/// Returns [`StoreError::Validation`] for a missing role or content, a
/// non-storable role, or negative token counts.
pub fn validate_append(request: AppendMessageRequest) -> StoreResult<NewMessage> {
    let content = request.content.as_deref().and_then(normalize_content);
    let (Some(role), Some(content)) = (request.role, content) else {
        return Err(StoreError::Validation(
            "Content and role are required".to_string(),
        ));
    };

    if !role.is_storable() {
        return Err(StoreError::Validation(
            "Role must be 'user' or 'assistant'".to_string(),
        ));
    }

    check_non_negative(request.token_count)?;
    check_non_negative(request.system_prompt_tokens)?;

    Ok(NewMessage {
        role,
        content,
        token_count: request.token_count.unwrap_or(0),
        system_prompt_tokens: request.system_prompt_tokens.unwrap_or(0),
    })
}
