use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use anyhow::anyhow;
use chatbot_agents::client::API_URL_ENV;
use chatbot_agents::client::DEFAULT_API_URL;
use chatbot_agents::client::DEFAULT_TIMEOUT_SECS;
use chatbot_agents::widget::DEFAULT_BIND;
use chatbot_agents::widget::DEFAULT_WIDGET_VERSION;
use chatbot_agents::widget::WIDGET_CONFIG_PATH;
use chatbot_agents::widget::WidgetEndpointSettings;
use dirs::home_dir;
use serde::Deserialize;
use serde::Serialize;
use tokio::fs;

pub const HOME_ENV: &str = "CHATBOT_HOME";
pub const USER_ID_ENV: &str = "CHATBOT_USER_ID";
pub const VERBOSE_ENV: &str = "CHATBOT_VERBOSE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub api: ApiConfig,
    pub user: UserConfig,
    pub widget: WidgetConfig,
    pub output: OutputConfig,

    // Runtime paths
    #[serde(skip)]
    pub config_dir: PathBuf,
    #[serde(skip)]
    pub config_file: PathBuf,
    #[serde(skip)]
    pub chatbots_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub bind: String,
    /// API URL advertised to widgets; defaults to `api.base_url`.
    #[serde(default)]
    pub public_api_url: Option<String>,
    pub version: String,
    pub config_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: String,
    pub verbose: bool,
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        let config_file = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| config_dir.join("config.yaml"));

        let mut config = if config_file.exists() {
            let contents = fs::read_to_string(&config_file).await?;
            let mut config: Config = serde_yaml::from_str(&contents)
                .map_err(|err| anyhow!("Invalid configuration {}: {err}", config_file.display()))?;
            config.set_paths(config_dir, config_file);
            config
        } else {
            let config = Self::default_config(config_dir, config_file);
            config.save().await?;
            config
        };

        config.merge_env_vars();
        Ok(config)
    }

    /// `$CHATBOT_HOME`, or `~/.chatbot-agents`.
    pub fn get_config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(HOME_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home = home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(".chatbot-agents"))
    }

    fn set_paths(&mut self, config_dir: PathBuf, config_file: PathBuf) {
        self.chatbots_dir = config_dir.join("chatbots");
        self.config_dir = config_dir;
        self.config_file = config_file;
    }

    pub async fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        fs::create_dir_all(&self.chatbots_dir).await?;
        if let Some(parent) = self.config_file.parent() {
            fs::create_dir_all(parent).await?;
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(&self.config_file, yaml).await?;
        Ok(())
    }

    fn default_config(config_dir: PathBuf, config_file: PathBuf) -> Self {
        let mut config = Config {
            version: "1.0.0".to_string(),
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            user: UserConfig {
                id: "local-user".to_string(),
            },
            widget: WidgetConfig {
                bind: DEFAULT_BIND.to_string(),
                public_api_url: None,
                version: DEFAULT_WIDGET_VERSION.to_string(),
                config_url: format!("http://{DEFAULT_BIND}{WIDGET_CONFIG_PATH}"),
            },
            output: OutputConfig {
                format: "text".to_string(),
                verbose: false,
            },
            config_dir: PathBuf::new(),
            config_file: PathBuf::new(),
            chatbots_dir: PathBuf::new(),
        };
        config.set_paths(config_dir, config_file);
        config
    }

    /// Environment variables win over the file.
    fn merge_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var(API_URL_ENV) {
            if !base_url.is_empty() {
                self.api.base_url = base_url;
            }
        }

        if let Ok(user_id) = std::env::var(USER_ID_ENV) {
            if !user_id.is_empty() {
                self.user.id = user_id;
            }
        }

        if std::env::var(VERBOSE_ENV).is_ok() {
            self.output.verbose = true;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn widget_endpoint_settings(&self) -> WidgetEndpointSettings {
        WidgetEndpointSettings {
            api_url: self
                .widget
                .public_api_url
                .clone()
                .unwrap_or_else(|| self.api.base_url.clone()),
            version: self.widget.version.clone(),
        }
    }

    /// Human-readable problems with the configuration; empty when healthy.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match url::Url::parse(&self.api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => issues.push(format!(
                "API base URL is not an http(s) URL: {}. Set {API_URL_ENV} or update the config.",
                self.api.base_url
            )),
        }

        if self.api.timeout_secs == 0 {
            issues.push("API timeout must be at least one second".to_string());
        }

        if self.user.id.trim().is_empty() {
            issues.push(format!("No user id configured. Set {USER_ID_ENV} or update the config."));
        }

        if self.widget.bind.parse::<SocketAddr>().is_err() {
            issues.push(format!("Widget bind address is invalid: {}", self.widget.bind));
        }

        if !self.config_dir.exists() {
            issues.push(format!(
                "Configuration directory does not exist: {}",
                self.config_dir.display()
            ));
        }

        issues
    }
}
