//! In-process store used when no database URL is configured.
//!
//! Data is lost on restart. Lookups are linear scans.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::{Assistant, Chat, Message};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    AppendOutcome, ChatStore, MessageRecord, NewAssistant, NewChat, NewMessage, StoreError,
    StoreResult,
};

#[derive(Debug, Default)]
struct MemoryState {
    assistants: HashMap<Uuid, Assistant>,
    chats: HashMap<Uuid, Chat>,
    /// Insertion order doubles as the tie-breaker for equal timestamps.
    messages: Vec<Message>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends with an explicit timestamp. Used to replay history.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown chat.
    pub async fn append_message_at(
        &self,
        chat_id: Uuid,
        new: NewMessage,
        created_at: DateTime<Utc>,
    ) -> StoreResult<AppendOutcome> {
        let mut state = self.state.write().await;

        if !state.chats.contains_key(&chat_id) {
            return Err(chat_not_found());
        }

        if let Some(existing) = state.messages.iter().find(|message| {
            message.chat_id == chat_id && message.role == new.role && message.content == new.content
        }) {
            return Ok(AppendOutcome::Duplicate(existing.clone()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role: new.role,
            content: new.content,
            token_count: new.token_count,
            system_prompt_tokens: new.system_prompt_tokens,
            created_at,
        };
        state.messages.push(message.clone());

        if let Some(chat) = state.chats.get_mut(&chat_id) {
            chat.updated_at = chat.updated_at.max(created_at);
        }

        Ok(AppendOutcome::Created(message))
    }
}

fn chat_not_found() -> StoreError {
    StoreError::NotFound("Chat not found".to_string())
}

fn sorted_by_time(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|message| message.created_at);
    messages
}

#[async_trait]
impl ChatStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_assistant(&self, new: NewAssistant) -> StoreResult<Assistant> {
        let assistant = Assistant {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            system_prompt: new.system_prompt,
            model: new.model,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .assistants
            .insert(assistant.id, assistant.clone());
        Ok(assistant)
    }

    async fn get_assistant(&self, id: Uuid) -> StoreResult<Option<Assistant>> {
        Ok(self.state.read().await.assistants.get(&id).cloned())
    }

    async fn list_assistants(&self) -> StoreResult<Vec<Assistant>> {
        let mut assistants: Vec<Assistant> =
            self.state.read().await.assistants.values().cloned().collect();
        assistants.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(assistants)
    }

    async fn create_chat(&self, new: NewChat) -> StoreResult<Chat> {
        let mut state = self.state.write().await;
        if let Some(assistant_id) = new.assistant_id {
            if !state.assistants.contains_key(&assistant_id) {
                return Err(StoreError::NotFound("Assistant not found".to_string()));
            }
        }

        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            title: new.title,
            user_fingerprint: new.user_fingerprint,
            assistant_id: new.assistant_id,
            created_at: now,
            updated_at: now,
        };
        state.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        Ok(self.state.read().await.chats.get(&id).cloned())
    }

    async fn list_chats(&self) -> StoreResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self.state.read().await.chats.values().cloned().collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn list_chats_for_user(&self, fingerprint: &str) -> StoreResult<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .state
            .read()
            .await
            .chats
            .values()
            .filter(|chat| chat.user_fingerprint == fingerprint)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn append_message(&self, chat_id: Uuid, new: NewMessage) -> StoreResult<AppendOutcome> {
        self.append_message_at(chat_id, new, Utc::now()).await
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        let state = self.state.read().await;
        if !state.chats.contains_key(&chat_id) {
            return Err(chat_not_found());
        }
        Ok(sorted_by_time(
            state
                .messages
                .iter()
                .filter(|message| message.chat_id == chat_id)
                .cloned()
                .collect(),
        ))
    }

    async fn correct_usage(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        token_count: Option<i64>,
        system_prompt_tokens: Option<i64>,
    ) -> StoreResult<Message> {
        let mut state = self.state.write().await;
        let message = state
            .messages
            .iter_mut()
            .find(|message| message.id == message_id && message.chat_id == chat_id)
            .ok_or_else(|| StoreError::NotFound("Message not found".to_string()))?;

        if let Some(tokens) = token_count {
            message.token_count = tokens;
        }
        if let Some(tokens) = system_prompt_tokens {
            message.system_prompt_tokens = tokens;
        }
        Ok(message.clone())
    }

    async fn delete_messages(&self, chat_id: Uuid) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        if !state.chats.contains_key(&chat_id) {
            return Err(chat_not_found());
        }
        let before = state.messages.len();
        state.messages.retain(|message| message.chat_id != chat_id);
        Ok((before - state.messages.len()) as u64)
    }

    async fn message_records(&self) -> StoreResult<Vec<MessageRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter_map(|message| {
                state.chats.get(&message.chat_id).map(|chat| MessageRecord {
                    message: message.clone(),
                    user_fingerprint: chat.user_fingerprint.clone(),
                    assistant_id: chat.assistant_id,
                })
            })
            .collect();
        records.sort_by_key(|record| record.message.created_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::models::MessageRole;

    async fn store_with_chat() -> (MemoryStore, Chat) {
        let store = MemoryStore::new();
        let chat = store
            .create_chat(NewChat {
                title: "New chat".into(),
                user_fingerprint: "fp-1".into(),
                assistant_id: None,
            })
            .await
            .unwrap();
        (store, chat)
    }

    fn user_message(content: &str) -> NewMessage {
        NewMessage {
            role: MessageRole::User,
            content: content.into(),
            token_count: 3,
            system_prompt_tokens: 0,
        }
    }

    #[tokio::test]
    async fn identical_append_is_a_duplicate() {
        let (store, chat) = store_with_chat().await;

        let first = store.append_message(chat.id, user_message("hi")).await.unwrap();
        let second = store.append_message(chat.id, user_message("hi")).await.unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(first.message().id, second.message().id);
        assert_eq!(store.list_messages(chat.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_content_with_different_role_is_not_a_duplicate() {
        let (store, chat) = store_with_chat().await;
        store.append_message(chat.id, user_message("ok")).await.unwrap();
        let reply = NewMessage {
            role: MessageRole::Assistant,
            ..user_message("ok")
        };
        assert!(!store.append_message(chat.id, reply).await.unwrap().is_duplicate());
    }

    #[tokio::test]
    async fn updated_at_never_moves_backwards() {
        let (store, chat) = store_with_chat().await;
        let later = chat.updated_at + Duration::minutes(5);
        let earlier = chat.updated_at - Duration::minutes(5);

        store
            .append_message_at(chat.id, user_message("late"), later)
            .await
            .unwrap();
        store
            .append_message_at(chat.id, user_message("early"), earlier)
            .await
            .unwrap();

        let chat = store.get_chat(chat.id).await.unwrap().unwrap();
        assert_eq!(chat.updated_at, later);

        let messages = store.list_messages(chat.id).await.unwrap();
        assert_eq!(messages[0].content, "early");
        assert_eq!(messages[1].content, "late");
    }

    #[tokio::test]
    async fn unknown_chat_and_assistant_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.append_message(Uuid::new_v4(), user_message("x")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store
                .create_chat(NewChat {
                    title: "t".into(),
                    user_fingerprint: "fp".into(),
                    assistant_id: Some(Uuid::new_v4()),
                })
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_and_correct_usage() {
        let (store, chat) = store_with_chat().await;
        let created = store
            .append_message(chat.id, user_message("hello"))
            .await
            .unwrap()
            .into_message();

        let corrected = store
            .correct_usage(chat.id, created.id, Some(42), None)
            .await
            .unwrap();
        assert_eq!(corrected.token_count, 42);
        assert_eq!(corrected.system_prompt_tokens, 0);

        assert_eq!(store.delete_messages(chat.id).await.unwrap(), 1);
        assert!(store.list_messages(chat.id).await.unwrap().is_empty());
        assert!(store.message_records().await.unwrap().is_empty());
    }
}
