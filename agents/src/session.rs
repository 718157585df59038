//! An editing session bound to one stored chatbot: load, save, register, test.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::client::ExecutionClient;
use crate::client::TestReply;
use crate::editor::ConfigEditor;
use crate::error::SessionError;
use crate::error::SessionResult;
use crate::store::ChatbotStore;
use crate::store::SettingType;

/// Outcome of one phase of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Completed,
    Failed(String),
    Skipped,
}

impl PhaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseOutcome::Completed)
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseOutcome::Completed => f.write_str("completed"),
            PhaseOutcome::Failed(message) => write!(f, "failed: {message}"),
            PhaseOutcome::Skipped => f.write_str("skipped"),
        }
    }
}

/// Result of writing the configuration to the store and then registering it
/// with the execution API. Registration is skipped when the store write fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub chatbot_id: String,
    pub fingerprint: String,
    pub stored: PhaseOutcome,
    pub registered: PhaseOutcome,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.stored.is_completed() && self.registered.is_completed()
    }

    /// Saved durably but the execution API does not know about it yet.
    pub fn is_partial(&self) -> bool {
        self.stored.is_completed() && !self.registered.is_completed()
    }
}

pub struct AgentSession {
    store: Arc<dyn ChatbotStore>,
    client: ExecutionClient,
    chatbot_id: String,
    editor: ConfigEditor,
}

impl AgentSession {
    pub fn new(
        store: Arc<dyn ChatbotStore>,
        client: ExecutionClient,
        chatbot_id: impl Into<String>,
        editor: ConfigEditor,
    ) -> Self {
        Self {
            store,
            client,
            chatbot_id: chatbot_id.into(),
            editor,
        }
    }

    /// Opens the stored chatbot. A stored agent section counts as a prior
    /// save; chatbots without one start from the default configuration.
    pub async fn load(
        store: Arc<dyn ChatbotStore>,
        client: ExecutionClient,
        chatbot_id: &str,
    ) -> SessionResult<Self> {
        let document = store
            .get_chatbot(chatbot_id)
            .await?
            .ok_or_else(|| SessionError::UnknownChatbot(chatbot_id.to_string()))?;
        let editor = match document.settings.agent {
            Some(config) => ConfigEditor::from_saved(config),
            None => ConfigEditor::default(),
        };
        Ok(Self::new(store, client, chatbot_id, editor))
    }

    pub fn chatbot_id(&self) -> &str {
        &self.chatbot_id
    }

    pub fn editor(&self) -> &ConfigEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut ConfigEditor {
        &mut self.editor
    }

    pub async fn save(&mut self) -> SaveReport {
        let config = self.editor.config().clone();
        let mut report = SaveReport {
            chatbot_id: self.chatbot_id.clone(),
            fingerprint: config.fingerprint(),
            stored: PhaseOutcome::Skipped,
            registered: PhaseOutcome::Skipped,
        };

        let stored = match serde_json::to_value(&config) {
            Ok(value) => self
                .store
                .update_chatbot_settings(&self.chatbot_id, SettingType::Agent, value)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(message) = stored {
            warn!(chatbot_id = %self.chatbot_id, "storing agent configuration failed: {message}");
            report.stored = PhaseOutcome::Failed(message);
            return report;
        }
        report.stored = PhaseOutcome::Completed;

        match self.client.register_config(&self.chatbot_id, &config).await {
            Ok(()) => {
                report.registered = PhaseOutcome::Completed;
                self.editor.mark_saved();
                info!(
                    chatbot_id = %self.chatbot_id,
                    fingerprint = %report.fingerprint,
                    "agent configuration saved and registered"
                );
            }
            Err(err) => {
                warn!(
                    chatbot_id = %self.chatbot_id,
                    "agent configuration stored but registration failed: {err}"
                );
                report.registered = PhaseOutcome::Failed(err.to_string());
            }
        }
        report
    }

    pub async fn test(&self, message: &str) -> SessionResult<TestReply> {
        if !self.editor.config_saved() {
            return Err(SessionError::NotSaved);
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        Ok(self.client.send_test_message(&self.chatbot_id, message).await?)
    }

    /// Uploads a file for `agent_id` and points its file_search tool at the
    /// resulting vector store. The change is unsaved until the next [`save`](Self::save).
    pub async fn upload_file(&mut self, agent_id: &str, path: &Path) -> SessionResult<String> {
        if !self.editor.config().has_agent(agent_id) {
            return Err(SessionError::UnknownAgent(agent_id.to_string()));
        }
        let vector_store_id = self.client.upload_agent_file(&self.chatbot_id, path).await?;
        self.editor.attach_vector_store(agent_id, &vector_store_id);
        info!(chatbot_id = %self.chatbot_id, agent_id, %vector_store_id, "attached uploaded file");
        Ok(vector_store_id)
    }
}
