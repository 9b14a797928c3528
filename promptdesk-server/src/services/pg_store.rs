use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Assistant, Chat, Message, MessageRole};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::store::{
    AppendOutcome, ChatStore, MessageRecord, NewAssistant, NewChat, NewMessage, StoreError,
    StoreResult,
};

const MESSAGE_COLUMNS: &str =
    "id, chat_id, role, content, token_count, system_prompt_tokens, created_at";

#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl fmt::Debug for PgChatStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgChatStore").finish()
    }
}

impl PgChatStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AssistantRow {
    id: Uuid,
    name: String,
    description: String,
    system_prompt: String,
    model: String,
    created_at: DateTime<Utc>,
}

impl From<AssistantRow> for Assistant {
    fn from(row: AssistantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            system_prompt: row.system_prompt,
            model: row.model,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    title: String,
    user_fingerprint: String,
    assistant_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChatRow> for Chat {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            user_fingerprint: row.user_fingerprint,
            assistant_id: row.assistant_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    role: String,
    content: String,
    token_count: i64,
    system_prompt_tokens: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::try_from(row.role.as_str())
            .map_err(|err| StoreError::Database(sqlx::Error::Decode(err.into())))?;
        Ok(Self {
            id: row.id,
            chat_id: row.chat_id,
            role,
            content: row.content,
            token_count: row.token_count,
            system_prompt_tokens: row.system_prompt_tokens,
            created_at: row.created_at,
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> StoreResult<Vec<Message>> {
    rows.into_iter().map(Message::try_from).collect()
}

#[async_trait]
impl ChatStore for PgChatStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(name = "store.create_assistant", skip(self, new), err)]
    async fn create_assistant(&self, new: NewAssistant) -> StoreResult<Assistant> {
        let row: AssistantRow = sqlx::query_as(
            r"INSERT INTO assistants (id, name, description, system_prompt, model)
              VALUES ($1, $2, $3, $4, $5)
              RETURNING id, name, description, system_prompt, model, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.system_prompt)
        .bind(&new.model)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_assistant(&self, id: Uuid) -> StoreResult<Option<Assistant>> {
        let row: Option<AssistantRow> = sqlx::query_as(
            "SELECT id, name, description, system_prompt, model, created_at FROM assistants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Assistant::from))
    }

    async fn list_assistants(&self) -> StoreResult<Vec<Assistant>> {
        let rows: Vec<AssistantRow> = sqlx::query_as(
            "SELECT id, name, description, system_prompt, model, created_at FROM assistants ORDER BY name, created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Assistant::from).collect())
    }

    #[instrument(name = "store.create_chat", skip(self, new), err)]
    async fn create_chat(&self, new: NewChat) -> StoreResult<Chat> {
        let row: ChatRow = sqlx::query_as(
            r"INSERT INTO chats (id, title, user_fingerprint, assistant_id)
              VALUES ($1, $2, $3, $4)
              RETURNING id, title, user_fingerprint, assistant_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.user_fingerprint)
        .bind(new.assistant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| StoreError::from_db_error(err, "Assistant not found"))?;
        Ok(row.into())
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id, title, user_fingerprint, assistant_id, created_at, updated_at FROM chats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Chat::from))
    }

    async fn list_chats(&self) -> StoreResult<Vec<Chat>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT id, title, user_fingerprint, assistant_id, created_at, updated_at FROM chats ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Chat::from).collect())
    }

    async fn list_chats_for_user(&self, fingerprint: &str) -> StoreResult<Vec<Chat>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            r"SELECT id, title, user_fingerprint, assistant_id, created_at, updated_at
              FROM chats WHERE user_fingerprint = $1 ORDER BY updated_at DESC",
        )
        .bind(fingerprint)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Chat::from).collect())
    }

    #[instrument(name = "store.append_message", skip(self, new), fields(role = %new.role), err)]
    async fn append_message(&self, chat_id: Uuid, new: NewMessage) -> StoreResult<AppendOutcome> {
        // The unique index on (chat_id, role, md5(content)) turns a repeated
        // append into a conflict, which is answered with the stored row.
        let inserted: Option<MessageRow> = sqlx::query_as(&format!(
            r"INSERT INTO messages (id, chat_id, role, content, token_count, system_prompt_tokens)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (chat_id, role, md5(content)) DO NOTHING
              RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(new.role.as_str())
        .bind(&new.content)
        .bind(new.token_count)
        .bind(new.system_prompt_tokens)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::from_db_error(err, "Chat not found"))?;

        if let Some(row) = inserted {
            let message = Message::try_from(row)?;
            sqlx::query(
                "UPDATE chats SET updated_at = GREATEST(updated_at, $2) WHERE id = $1",
            )
            .bind(chat_id)
            .bind(message.created_at)
            .execute(&self.pool)
            .await?;
            return Ok(AppendOutcome::Created(message));
        }

        let existing: MessageRow = sqlx::query_as(&format!(
            r"SELECT {MESSAGE_COLUMNS} FROM messages
              WHERE chat_id = $1 AND role = $2 AND md5(content) = md5($3) AND content = $3
              ORDER BY created_at LIMIT 1"
        ))
        .bind(chat_id)
        .bind(new.role.as_str())
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(AppendOutcome::Duplicate(Message::try_from(existing)?))
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        if self.get_chat(chat_id).await?.is_none() {
            return Err(StoreError::NotFound("Chat not found".to_string()));
        }
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = $1 ORDER BY created_at, id"
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        into_messages(rows)
    }

    #[instrument(name = "store.correct_usage", skip(self), err)]
    async fn correct_usage(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        token_count: Option<i64>,
        system_prompt_tokens: Option<i64>,
    ) -> StoreResult<Message> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            r"UPDATE messages
              SET token_count = COALESCE($3, token_count),
                  system_prompt_tokens = COALESCE($4, system_prompt_tokens)
              WHERE chat_id = $1 AND id = $2
              RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(chat_id)
        .bind(message_id)
        .bind(token_count)
        .bind(system_prompt_tokens)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StoreError::from_db_error(err, "Message not found"))?;

        row.ok_or_else(|| StoreError::NotFound("Message not found".to_string()))?
            .try_into()
    }

    #[instrument(name = "store.delete_messages", skip(self), err)]
    async fn delete_messages(&self, chat_id: Uuid) -> StoreResult<u64> {
        if self.get_chat(chat_id).await?.is_none() {
            return Err(StoreError::NotFound("Chat not found".to_string()));
        }
        let result = sqlx::query("DELETE FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn message_records(&self) -> StoreResult<Vec<MessageRecord>> {
        #[derive(sqlx::FromRow)]
        struct RecordRow {
            #[sqlx(flatten)]
            message: MessageRow,
            user_fingerprint: String,
            assistant_id: Option<Uuid>,
        }

        let rows: Vec<RecordRow> = sqlx::query_as(
            r"SELECT m.id, m.chat_id, m.role, m.content, m.token_count, m.system_prompt_tokens,
                     m.created_at, c.user_fingerprint, c.assistant_id
              FROM messages m
              JOIN chats c ON c.id = m.chat_id
              ORDER BY m.created_at, m.id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MessageRecord {
                    message: Message::try_from(row.message)?,
                    user_fingerprint: row.user_fingerprint,
                    assistant_id: row.assistant_id,
                })
            })
            .collect()
    }
}
