use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::debug;
use tracing::warn;

use super::ChatbotDocument;
use super::ChatbotPatch;
use super::ChatbotStore;
use super::SettingType;
use super::checked_name;
use super::new_chatbot_id;
use super::sort_newest_first;
use crate::error::StoreError;
use crate::error::StoreResult;

/// One pretty-printed JSON document per chatbot, named `<id>.json`.
///
/// Writes go through a temporary file and a rename, so a crash never leaves a
/// half-written document behind. Concurrent writers are last-write-wins.
#[derive(Debug, Clone)]
pub struct FileChatbotStore {
    dir: PathBuf,
}

impl FileChatbotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> StoreResult<PathBuf> {
        // Ids become file names; refuse anything that could escape the directory.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read_document(&self, path: &Path) -> StoreResult<Option<ChatbotDocument>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(path, err)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Document {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write_document(&self, document: &ChatbotDocument) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| StoreError::io(&self.dir, err))?;

        let path = self.document_path(&document.id)?;
        let tmp_path = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Document {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp_path, contents)
            .await
            .map_err(|err| StoreError::io(&tmp_path, err))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|err| StoreError::io(&path, err))?;
        debug!(chatbot_id = %document.id, path = %path.display(), "wrote chatbot document");
        Ok(())
    }

    async fn load_existing(&self, id: &str) -> StoreResult<ChatbotDocument> {
        let path = self.document_path(id)?;
        self.read_document(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl ChatbotStore for FileChatbotStore {
    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<ChatbotDocument>> {
        match self.document_path(id) {
            Ok(path) => self.read_document(&path).await,
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_user_chatbots(&self, user_id: &str) -> StoreResult<Vec<ChatbotDocument>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(&self.dir, err)),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::io(&self.dir, err))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_document(&path).await {
                Ok(Some(document)) if document.user_id == user_id => documents.push(document),
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), "skipping unreadable chatbot document: {err}"),
            }
        }

        sort_newest_first(&mut documents);
        Ok(documents)
    }

    async fn create_chatbot(&self, user_id: &str, name: &str) -> StoreResult<ChatbotDocument> {
        let document = ChatbotDocument::new(new_chatbot_id(), user_id, checked_name(name)?);
        self.write_document(&document).await?;
        Ok(document)
    }

    async fn update_chatbot(&self, id: &str, patch: ChatbotPatch) -> StoreResult<()> {
        let mut document = self.load_existing(id).await?;
        document.apply_patch(patch);
        self.write_document(&document).await
    }

    async fn update_chatbot_settings(&self, id: &str, setting: SettingType, value: Value) -> StoreResult<()> {
        let mut document = self.load_existing(id).await?;
        document.settings.apply(setting, value)?;
        document.touch();
        self.write_document(&document).await
    }

    async fn delete_chatbot(&self, id: &str) -> StoreResult<()> {
        let path = self.document_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(err) => Err(StoreError::io(&path, err)),
        }
    }
}
