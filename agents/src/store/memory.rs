use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::ChatbotDocument;
use super::ChatbotPatch;
use super::ChatbotStore;
use super::SettingType;
use super::checked_name;
use super::new_chatbot_id;
use super::sort_newest_first;
use crate::error::StoreError;
use crate::error::StoreResult;

/// Process-local store, used by tests and previews.
#[derive(Debug, Default)]
pub struct MemoryChatbotStore {
    documents: RwLock<HashMap<String, ChatbotDocument>>,
}

impl MemoryChatbotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document: ChatbotDocument) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }
}

#[async_trait]
impl ChatbotStore for MemoryChatbotStore {
    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<ChatbotDocument>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn get_user_chatbots(&self, user_id: &str) -> StoreResult<Vec<ChatbotDocument>> {
        let mut documents: Vec<ChatbotDocument> = self
            .documents
            .read()
            .await
            .values()
            .filter(|document| document.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut documents);
        Ok(documents)
    }

    async fn create_chatbot(&self, user_id: &str, name: &str) -> StoreResult<ChatbotDocument> {
        let document = ChatbotDocument::new(new_chatbot_id(), user_id, checked_name(name)?);
        self.insert(document.clone()).await;
        Ok(document)
    }

    async fn update_chatbot(&self, id: &str, patch: ChatbotPatch) -> StoreResult<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        document.apply_patch(patch);
        Ok(())
    }

    async fn update_chatbot_settings(&self, id: &str, setting: SettingType, value: Value) -> StoreResult<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        document.settings.apply(setting, value)?;
        document.touch();
        Ok(())
    }

    async fn delete_chatbot(&self, id: &str) -> StoreResult<()> {
        self.documents
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
