use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use tracing::warn;
use url::Url;

use super::WidgetConfigResponse;
use crate::client::DEFAULT_TIMEOUT_SECS;
use crate::client::ExecutionClient;
use crate::client::check_status;
use crate::error::ClientError;
use crate::error::ClientResult;
use crate::error::WidgetError;

pub const FALLBACK_ERROR: &str = "Sorry, I encountered an error. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PanelState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    WaitingForResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub text: String,
}

/// Looks up the execution API for `chatbot_id` through the widget-config endpoint.
pub async fn fetch_widget_config(config_url: &str, chatbot_id: &str) -> ClientResult<WidgetConfigResponse> {
    let mut url = Url::parse(config_url).map_err(|_| ClientError::InvalidBaseUrl(config_url.to_string()))?;
    url.query_pairs_mut().append_pair("chatbotId", chatbot_id);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()?;
    let response = http.get(url).send().await?;
    Ok(check_status(response).await?.json().await?)
}

/// Chat widget state: a toggleable panel and a request loop that allows one
/// message in flight at a time.
#[derive(Debug)]
pub struct WidgetRuntime {
    chatbot_id: String,
    config_url: String,
    api: Option<ExecutionClient>,
    panel: PanelState,
    phase: Phase,
    transcript: Vec<TranscriptEntry>,
}

impl WidgetRuntime {
    pub fn new(chatbot_id: impl Into<String>, config_url: impl Into<String>) -> Self {
        Self {
            chatbot_id: chatbot_id.into(),
            config_url: config_url.into(),
            api: None,
            panel: PanelState::Closed,
            phase: Phase::Idle,
            transcript: Vec::new(),
        }
    }

    /// Skips the config lookup and talks to `api` directly.
    pub fn with_api(mut self, api: ExecutionClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn chatbot_id(&self) -> &str {
        &self.chatbot_id
    }

    pub fn panel(&self) -> PanelState {
        self.panel
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn toggle(&mut self) -> PanelState {
        self.panel = match self.panel {
            PanelState::Closed => PanelState::Open,
            PanelState::Open => PanelState::Closed,
        };
        self.panel
    }

    /// Records a user message and enters the waiting phase.
    ///
    /// Returns `Ok(None)` for blank input and [`WidgetError::Busy`] while a
    /// reply is still pending.
    pub fn begin_send(&mut self, message: &str) -> Result<Option<String>, WidgetError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }
        if self.phase == Phase::WaitingForResponse {
            return Err(WidgetError::Busy);
        }
        self.panel = PanelState::Open;
        self.phase = Phase::WaitingForResponse;
        self.transcript.push(TranscriptEntry {
            sender: Sender::User,
            text: message.to_string(),
        });
        Ok(Some(message.to_string()))
    }

    /// Records the reply (or the fallback text on failure) and returns to idle.
    pub fn finish(&mut self, reply: Result<String, WidgetError>) -> &TranscriptEntry {
        let text = match reply {
            Ok(text) => text,
            Err(err) => {
                warn!(chatbot_id = %self.chatbot_id, "widget request failed: {err}");
                FALLBACK_ERROR.to_string()
            }
        };
        self.phase = Phase::Idle;
        self.transcript.push(TranscriptEntry {
            sender: Sender::Bot,
            text,
        });
        &self.transcript[self.transcript.len() - 1]
    }

    async fn api(&mut self) -> Result<&ExecutionClient, WidgetError> {
        if self.api.is_none() {
            let config = fetch_widget_config(&self.config_url, &self.chatbot_id).await?;
            debug!(chatbot_id = %self.chatbot_id, api_url = %config.api_url, "resolved widget API");
            self.api = Some(ExecutionClient::new(&config.api_url)?);
        }
        self.api
            .as_ref()
            .ok_or_else(|| WidgetError::Lookup(ClientError::InvalidBaseUrl(self.config_url.clone())))
    }

    /// Sends one message and waits for the reply. Returns the bot's entry,
    /// or `None` when the message was blank.
    pub async fn send(&mut self, message: &str) -> Result<Option<TranscriptEntry>, WidgetError> {
        let Some(message) = self.begin_send(message)? else {
            return Ok(None);
        };
        let chatbot_id = self.chatbot_id.clone();
        let reply = match self.api().await {
            Ok(api) => api
                .send_widget_message(&chatbot_id, &message)
                .await
                .map_err(WidgetError::from),
            Err(err) => Err(err),
        };
        Ok(Some(self.finish(reply).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn toggle_flips_panel() {
        let mut runtime = WidgetRuntime::new("bot", "http://localhost/api/widget-config");
        assert_eq!(runtime.panel(), PanelState::Closed);
        assert_eq!(runtime.toggle(), PanelState::Open);
        assert_eq!(runtime.toggle(), PanelState::Closed);
    }

    #[test]
    fn sending_opens_panel_and_blocks_second_message() {
        let mut runtime = WidgetRuntime::new("bot", "http://localhost/api/widget-config");
        assert_eq!(runtime.begin_send("   ").unwrap(), None);
        assert!(runtime.transcript().is_empty());

        assert_eq!(runtime.begin_send(" hi ").unwrap().as_deref(), Some("hi"));
        assert_eq!(runtime.panel(), PanelState::Open);
        assert_eq!(runtime.phase(), Phase::WaitingForResponse);
        assert!(matches!(runtime.begin_send("again"), Err(WidgetError::Busy)));

        runtime.finish(Err(WidgetError::Busy));
        assert_eq!(runtime.phase(), Phase::Idle);
        assert_eq!(
            runtime.transcript(),
            &[
                TranscriptEntry {
                    sender: Sender::User,
                    text: "hi".to_string()
                },
                TranscriptEntry {
                    sender: Sender::Bot,
                    text: FALLBACK_ERROR.to_string()
                },
            ]
        );
    }
}
