use std::{fmt, sync::Arc};

use shared::models::{Assistant, Chat, CreateAssistantRequest, CreateChatRequest};
use tracing::{info, instrument};
use uuid::Uuid;

use super::store::{ChatStore, NewAssistant, NewChat, StoreError, StoreResult};

/// Title given to chats created without one.
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

/// Assistant and chat management on top of a [`ChatStore`].
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
}

impl fmt::Debug for ChatService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatService")
            .field("store", &self.store.backend())
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl ChatService {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Creates an assistant. A missing model falls back to `default_model`.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] for a blank name.
    #[instrument(name = "chat.create_assistant", skip(self, request), err)]
    pub async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
        default_model: &str,
    ) -> StoreResult<Assistant> {
        let name = non_blank(Some(request.name))
            .ok_or_else(|| StoreError::Validation("Assistant name is required".to_string()))?;

        let assistant = self
            .store
            .create_assistant(NewAssistant {
                name,
                description: request.description.unwrap_or_default(),
                system_prompt: request.system_prompt.unwrap_or_default(),
                model: non_blank(request.model).unwrap_or_else(|| default_model.to_string()),
            })
            .await?;

        info!(assistant_id = %assistant.id, model = %assistant.model, "assistant created");
        Ok(assistant)
    }

    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn get_assistant(&self, id: Uuid) -> StoreResult<Assistant> {
        self.store
            .get_assistant(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Assistant not found".to_string()))
    }

    /// All assistants, ordered by name.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] for backend failures.
    pub async fn list_assistants(&self) -> StoreResult<Vec<Assistant>> {
        self.store.list_assistants().await
    }

    /// Creates a chat for a user fingerprint.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] for a blank fingerprint and
    /// [`StoreError::NotFound`] for an unknown assistant.
    #[instrument(name = "chat.create_chat", skip(self, request), err)]
    pub async fn create_chat(&self, request: CreateChatRequest) -> StoreResult<Chat> {
        let user_fingerprint = non_blank(Some(request.user_fingerprint))
            .ok_or_else(|| StoreError::Validation("userFingerprint is required".to_string()))?;

        self.store
            .create_chat(NewChat {
                title: non_blank(request.title).unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string()),
                user_fingerprint,
                assistant_id: request.assistant_id,
            })
            .await
    }

    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn get_chat(&self, id: Uuid) -> StoreResult<Chat> {
        self.store
            .get_chat(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Chat not found".to_string()))
    }

    /// Chats of one user, most recently updated first.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] when no fingerprint is given.
    pub async fn list_chats_for_user(&self, fingerprint: Option<String>) -> StoreResult<Vec<Chat>> {
        let fingerprint = non_blank(fingerprint)
            .ok_or_else(|| StoreError::Validation("userFingerprint is required".to_string()))?;
        self.store.list_chats_for_user(&fingerprint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;

    fn service() -> ChatService {
        ChatService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn assistant_defaults() {
        let service = service();
        let assistant = service
            .create_assistant(
                CreateAssistantRequest {
                    name: "  Tutor ".into(),
                    description: None,
                    system_prompt: Some("Explain slowly.".into()),
                    model: Some("   ".into()),
                },
                "gpt-4o-mini",
            )
            .await
            .unwrap();

        assert_eq!(assistant.name, "Tutor");
        assert_eq!(assistant.model, "gpt-4o-mini");
        assert_eq!(assistant.description, "");
        assert_eq!(service.get_assistant(assistant.id).await.unwrap(), assistant);
    }

    #[tokio::test]
    async fn blank_names_and_fingerprints_are_rejected() {
        let service = service();
        let result = service
            .create_assistant(
                CreateAssistantRequest {
                    name: " ".into(),
                    description: None,
                    system_prompt: None,
                    model: None,
                },
                "gpt-4o-mini",
            )
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        let result = service
            .create_chat(CreateChatRequest {
                user_fingerprint: String::new(),
                assistant_id: None,
                title: None,
            })
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        assert!(matches!(
            service.list_chats_for_user(None).await,
            Err(StoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn chats_get_default_title_and_are_listed_per_user() {
        let service = service();
        let chat = service
            .create_chat(CreateChatRequest {
                user_fingerprint: "fp-1".into(),
                assistant_id: None,
                title: None,
            })
            .await
            .unwrap();
        assert_eq!(chat.title, DEFAULT_CHAT_TITLE);

        let chats = service
            .list_chats_for_user(Some("fp-1".into()))
            .await
            .unwrap();
        assert_eq!(chats, vec![chat]);
        assert!(
            service
                .list_chats_for_user(Some("fp-2".into()))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
