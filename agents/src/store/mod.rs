//! Durable storage of chatbot documents.
//!
//! A chatbot document carries the dashboard's settings sections. Only the
//! `agent` section is typed here; appearance, rules and suggestions belong to
//! other editors and are kept as opaque JSON.

mod file;
mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::error::StoreResult;
use crate::model::AgentConfig;

pub use file::FileChatbotStore;
pub use memory::MemoryChatbotStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotDocument {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: ChatbotSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatbotSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Appearance,
    Rules,
    Suggestions,
    Agent,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Appearance => "appearance",
            SettingType::Rules => "rules",
            SettingType::Suggestions => "suggestions",
            SettingType::Agent => "agent",
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "appearance" => Ok(SettingType::Appearance),
            "rules" => Ok(SettingType::Rules),
            "suggestions" => Ok(SettingType::Suggestions),
            "agent" => Ok(SettingType::Agent),
            other => Err(StoreError::UnknownSetting(other.to_string())),
        }
    }
}

impl ChatbotSettings {
    /// Replaces one section. The agent section must parse as an [`AgentConfig`].
    pub fn apply(&mut self, setting: SettingType, value: Value) -> StoreResult<()> {
        match setting {
            SettingType::Appearance => self.appearance = Some(value),
            SettingType::Rules => self.rules = Some(value),
            SettingType::Suggestions => self.suggestions = Some(value),
            SettingType::Agent => {
                let config = serde_json::from_value(value).map_err(|source| {
                    StoreError::InvalidSettings {
                        setting: setting.to_string(),
                        source,
                    }
                })?;
                self.agent = Some(config);
            }
        }
        Ok(())
    }
}

/// Fields of a chatbot document that can be replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatbotPatch {
    pub name: Option<String>,
    pub settings: Option<ChatbotSettings>,
}

impl ChatbotDocument {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            settings: ChatbotSettings::default(),
        }
    }

    pub fn apply_patch(&mut self, patch: ChatbotPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(settings) = patch.settings {
            self.settings = settings;
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// The stored agent configuration, or the built-in default when none exists yet.
    pub fn agent_config_or_default(&self) -> AgentConfig {
        self.settings.agent.clone().unwrap_or_default()
    }
}

#[async_trait]
pub trait ChatbotStore: Send + Sync {
    async fn get_chatbot(&self, id: &str) -> StoreResult<Option<ChatbotDocument>>;

    /// Chatbots owned by `user_id`, most recently updated first.
    async fn get_user_chatbots(&self, user_id: &str) -> StoreResult<Vec<ChatbotDocument>>;

    async fn create_chatbot(&self, user_id: &str, name: &str) -> StoreResult<ChatbotDocument>;

    async fn update_chatbot(&self, id: &str, patch: ChatbotPatch) -> StoreResult<()>;

    async fn update_chatbot_settings(&self, id: &str, setting: SettingType, value: Value) -> StoreResult<()>;

    async fn delete_chatbot(&self, id: &str) -> StoreResult<()>;
}

pub(crate) fn new_chatbot_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn checked_name(name: &str) -> StoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        Err(StoreError::EmptyName)
    } else {
        Ok(name.to_string())
    }
}

pub(crate) fn sort_newest_first(documents: &mut [ChatbotDocument]) {
    documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}
